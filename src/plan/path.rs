//! The Path tree: the optimizer's cost-annotated abstract access strategy,
//! and the input artifact this stage consumes. Path nodes are never
//! mutated by this stage.

use crate::catalog::IndexDef;
use crate::common::TableId;
use crate::plan::clauses::RestrictInfo;
use crate::plan::expr::ExprRef;
use crate::plan::plan::{Plan, TargetEntry};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RteKind {
    Relation,
    Subquery,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Whether this join type participates in outer-join NULL-extension:
    /// conditions that govern which rows get extended with NULLs must be
    /// kept separate from purely residual quals.
    pub fn is_outer(self) -> bool {
        !matches!(self, JoinType::Inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// One equivalence-class member of a pathkey: any one of several
/// expressions that all induce the same ordering. `sortop` is the operator
/// name used to compare two values under this key.
#[derive(Debug, Clone)]
pub struct PathKeyItem {
    pub key: ExprRef,
    pub sortop: String,
}

/// A pathkey is a list of equivalent `PathKeyItem`s; a full pathkey list is
/// a lexicographic sort specification, one pathkey per sort column.
pub type PathKey = Vec<PathKeyItem>;

/// Back-reference describing the relation(s) a Path produces.
#[derive(Debug, Clone)]
pub struct RelOptInfo {
    pub relids: Vec<TableId>,
    pub rtekind: RteKind,
    pub targetlist: Vec<TargetEntry>,
    pub rows: f64,
    pub width: i32,
    pub baserestrictinfo: Vec<RestrictInfo>,
    /// For subquery scans: the already-materialized subplan (planned by an
    /// earlier, recursive invocation of this same stage).
    pub subplan: Option<Rc<Plan>>,
}

impl RelOptInfo {
    /// A scan Path's relation must name exactly one relid, matching the
    /// scan variant's expected `rtekind`.
    pub fn single_relid(&self) -> Option<TableId> {
        match self.relids.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// Cost/row fields shared by every scan Path.
#[derive(Debug, Clone)]
pub struct ScanPathCommon {
    pub rel: Rc<RelOptInfo>,
    pub startup_cost: f64,
    pub total_cost: f64,
}

/// Cost/row fields and child links shared by every join Path.
#[derive(Debug)]
pub struct JoinPathCommon {
    pub outer: Box<Path>,
    pub inner: Box<Path>,
    pub jointype: JoinType,
    pub joinrestrictinfo: Vec<RestrictInfo>,
    pub startup_cost: f64,
    pub total_cost: f64,
    pub rows: f64,
}

#[derive(Debug)]
pub enum Path {
    SeqScan(ScanPathCommon),
    TidScan { common: ScanPathCommon, tideval: ExprRef },
    SubqueryScan { common: ScanPathCommon },
    FunctionScan { common: ScanPathCommon },
    IndexScan {
        common: ScanPathCommon,
        /// One `IndexDef` per top-level OR sublist, aligned positionally
        /// with `indexqual`.
        indexinfo: Vec<IndexDef>,
        /// OR-of-ANDs: outer `Vec` is OR'd, each inner `Vec` is AND'd.
        indexqual: Vec<Vec<RestrictInfo>>,
        indexscandir: ScanDirection,
        rows: f64,
    },
    NestLoop(JoinPathCommon),
    MergeJoin {
        common: JoinPathCommon,
        path_mergeclauses: Vec<RestrictInfo>,
        outersortkeys: Vec<PathKey>,
        innersortkeys: Vec<PathKey>,
    },
    HashJoin {
        common: JoinPathCommon,
        path_hashclauses: Vec<RestrictInfo>,
    },
    Append { subpaths: Vec<Path> },
    Result {
        constantqual: Vec<RestrictInfo>,
        subpath: Option<Box<Path>>,
    },
    Material { subpath: Box<Path> },
}
