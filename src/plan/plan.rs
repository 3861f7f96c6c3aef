//! The Plan tree: the concrete, executor-ready operator DAG this stage
//! produces. Plans are built bottom-up and are immutable once construction
//! completes — nothing in this module exposes `&mut` access to a `Plan`
//! after its builder returns.

use crate::common::TableId;
use crate::plan::expr::ExprRef;
use crate::plan::path::{JoinType, ScanDirection};

/// A target-list entry. `reskey`/`reskeyop` are sort-key metadata: `reskey
/// == 0` means "not a sort key", otherwise it is the 1-based position of
/// this entry among a Sort node's keys. `resjunk` marks an entry that is not
/// user-visible but is still required for evaluation (e.g. a sort key
/// pulled in only so a Sort plan's child can compute it).
#[derive(Debug, Clone)]
pub struct TargetEntry {
    pub expr: ExprRef,
    pub resno: i32,
    pub resjunk: bool,
    pub reskey: i32,
    pub reskeyop: Option<String>,
}

impl TargetEntry {
    pub fn new(expr: ExprRef, resno: i32) -> Self {
        Self {
            expr,
            resno,
            resjunk: false,
            reskey: 0,
            reskeyop: None,
        }
    }

    pub fn resjunk(mut self) -> Self {
        self.resjunk = true;
        self
    }
}

/// Fields every Plan node carries, factored out as a common header.
#[derive(Debug, Clone, Default)]
pub struct PlanHeader {
    pub targetlist: Vec<TargetEntry>,
    pub qual: Vec<ExprRef>,
    pub startup_cost: f64,
    pub total_cost: f64,
    pub plan_rows: f64,
    pub plan_width: i32,
}

/// `SetOp`'s command tag: which relational difference/intersection the node
/// computes. Carried through so EXPLAIN can label the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpCmd {
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

/// The `Hash` node's child-type constraint — `HashJoin.righttree` is always
/// exactly this shape — is encoded directly in the type system rather than
/// asserted at runtime.
#[derive(Debug, Clone)]
pub struct HashNode {
    pub header: PlanHeader,
    pub hashkeys: Vec<ExprRef>,
    pub lefttree: Box<Plan>,
}

#[derive(Debug, Clone)]
pub enum Plan {
    SeqScan {
        header: PlanHeader,
        scanrelid: TableId,
    },
    TidScan {
        header: PlanHeader,
        scanrelid: TableId,
        tideval: ExprRef,
    },
    FunctionScan {
        header: PlanHeader,
        scanrelid: TableId,
    },
    SubqueryScan {
        header: PlanHeader,
        scanrelid: TableId,
        subplan: Box<Plan>,
    },
    IndexScan {
        header: PlanHeader,
        scanrelid: TableId,
        indxid: Vec<u32>,
        /// Rewritten, index-attribute-numbered OR-of-ANDs.
        indxqual: Vec<Vec<ExprRef>>,
        /// Original, table-attribute-numbered OR-of-ANDs, kept for
        /// NestLoop's inner-scan clause elimination and for EXPLAIN.
        indxqualorig: Vec<Vec<ExprRef>>,
        indxorderdir: ScanDirection,
    },
    NestLoop {
        header: PlanHeader,
        jointype: JoinType,
        joinqual: Vec<ExprRef>,
        lefttree: Box<Plan>,
        righttree: Box<Plan>,
    },
    MergeJoin {
        header: PlanHeader,
        jointype: JoinType,
        joinqual: Vec<ExprRef>,
        mergeclauses: Vec<ExprRef>,
        lefttree: Box<Plan>,
        righttree: Box<Plan>,
    },
    HashJoin {
        header: PlanHeader,
        jointype: JoinType,
        joinqual: Vec<ExprRef>,
        hashclauses: Vec<ExprRef>,
        lefttree: Box<Plan>,
        righttree: Box<HashNode>,
    },
    Append {
        header: PlanHeader,
        appendplans: Vec<Plan>,
        is_target: bool,
    },
    Result {
        header: PlanHeader,
        resconstantqual: Vec<ExprRef>,
        subplan: Option<Box<Plan>>,
    },
    Material {
        header: PlanHeader,
        lefttree: Box<Plan>,
    },
    Sort {
        header: PlanHeader,
        keycount: usize,
        lefttree: Box<Plan>,
    },
    Agg {
        header: PlanHeader,
        grouped: bool,
        num_groups: f64,
        lefttree: Box<Plan>,
    },
    Group {
        header: PlanHeader,
        num_groups: f64,
        lefttree: Box<Plan>,
    },
    Unique {
        header: PlanHeader,
        uniq_cols: Vec<i32>,
        lefttree: Box<Plan>,
    },
    SetOp {
        header: PlanHeader,
        cmd: SetOpCmd,
        flag_col: i32,
        dup_cols: Vec<i32>,
        lefttree: Box<Plan>,
    },
    Limit {
        header: PlanHeader,
        limit_offset: Option<ExprRef>,
        limit_count: Option<ExprRef>,
        lefttree: Box<Plan>,
    },
}

impl Plan {
    pub fn header(&self) -> &PlanHeader {
        match self {
            Plan::SeqScan { header, .. }
            | Plan::TidScan { header, .. }
            | Plan::FunctionScan { header, .. }
            | Plan::SubqueryScan { header, .. }
            | Plan::IndexScan { header, .. }
            | Plan::NestLoop { header, .. }
            | Plan::MergeJoin { header, .. }
            | Plan::HashJoin { header, .. }
            | Plan::Append { header, .. }
            | Plan::Result { header, .. }
            | Plan::Material { header, .. }
            | Plan::Sort { header, .. }
            | Plan::Agg { header, .. }
            | Plan::Group { header, .. }
            | Plan::Unique { header, .. }
            | Plan::SetOp { header, .. }
            | Plan::Limit { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut PlanHeader {
        match self {
            Plan::SeqScan { header, .. }
            | Plan::TidScan { header, .. }
            | Plan::FunctionScan { header, .. }
            | Plan::SubqueryScan { header, .. }
            | Plan::IndexScan { header, .. }
            | Plan::NestLoop { header, .. }
            | Plan::MergeJoin { header, .. }
            | Plan::HashJoin { header, .. }
            | Plan::Append { header, .. }
            | Plan::Result { header, .. }
            | Plan::Material { header, .. }
            | Plan::Sort { header, .. }
            | Plan::Agg { header, .. }
            | Plan::Group { header, .. }
            | Plan::Unique { header, .. }
            | Plan::SetOp { header, .. }
            | Plan::Limit { header, .. } => header,
        }
    }

    /// The single main child, for the node kinds that have exactly one
    /// (everything except the scans, which have none, and the joins, which
    /// have two named children accessed directly on their variant).
    pub fn single_child(&self) -> Option<&Plan> {
        match self {
            Plan::SubqueryScan { subplan, .. } => Some(subplan),
            Plan::Result { subplan, .. } => subplan.as_deref(),
            Plan::Material { lefttree, .. }
            | Plan::Sort { lefttree, .. }
            | Plan::Agg { lefttree, .. }
            | Plan::Group { lefttree, .. }
            | Plan::Unique { lefttree, .. }
            | Plan::SetOp { lefttree, .. }
            | Plan::Limit { lefttree, .. } => Some(lefttree),
            _ => None,
        }
    }
}
