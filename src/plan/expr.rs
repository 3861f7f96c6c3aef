//! Expression trees shared between Path and Plan nodes.
//!
//! Expressions are reference-counted (`Rc`) rather than owned outright:
//! Path-held and Plan-held expressions legitimately share read-only
//! substructure, and `set_difference` over qual lists relies on pointer
//! identity rather than structural equality. Wherever isolation from the
//! original is required (index-qual rewriting, clause commutation, recheck
//! clauses) we build a fresh `Rc` via [`deep_copy`] instead of cloning the
//! handle.

use crate::common::{ColumnId, DataType, TableId, Value};
use std::collections::BTreeSet;
use std::rc::Rc;

pub type ExprRef = Rc<Expr>;
pub type RelidSet = BTreeSet<TableId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// An expression node. Binary operator clauses are modeled with explicit
/// `left`/`right` fields (rather than a generic arg list) because clause
/// commutation and index-key rewriting both need to address "the left
/// operand" directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference: `varno` is the relid it comes from, `varattno`
    /// the 1-based attribute number within that relation (or, after
    /// index-qual rewriting, within the index's key list).
    Var {
        varno: TableId,
        varattno: ColumnId,
        vartype: DataType,
    },
    Const(Value),
    /// A binary-compatible relabel wrapper (a no-op cast); stripped when
    /// rewriting index quals.
    RelabelType { arg: ExprRef, result_type: DataType },
    /// `op(left, right)`. `lossy` marks whether this specific operator, in
    /// the opclass it was resolved against, may produce false positives.
    OpExpr {
        opno: String,
        left: ExprRef,
        right: ExprRef,
        lossy: bool,
    },
    BoolExpr { op: BoolOp, args: Vec<ExprRef> },
    /// Stands in for a reference to a SubPlan/InitPlan node. Real subplan
    /// trees are out of scope for this stage; only the distinction between
    /// "this clause touches a subplan" (affects qual ordering) and "this
    /// clause is an InitPlan reference" (does not) matters here.
    SubPlanRef { is_init_plan: bool },
}

impl Expr {
    pub fn var(varno: TableId, varattno: ColumnId, vartype: DataType) -> ExprRef {
        Rc::new(Expr::Var { varno, varattno, vartype })
    }

    pub fn op(opno: impl Into<String>, left: ExprRef, right: ExprRef, lossy: bool) -> ExprRef {
        Rc::new(Expr::OpExpr {
            opno: opno.into(),
            left,
            right,
            lossy,
        })
    }

    /// The result type of an expression. `OpExpr`/`BoolExpr` nodes don't
    /// carry a result type here (this stage never evaluates expressions) so
    /// they fall back to `Boolean`, which is always correct for a qual
    /// clause.
    pub fn expr_type(&self) -> DataType {
        match self {
            Expr::Var { vartype, .. } => *vartype,
            Expr::Const(v) => match v {
                Value::Integer(_) => DataType::BigInt,
                Value::Float(_) => DataType::Double,
                Value::Boolean(_) => DataType::Boolean,
                Value::String(_) => DataType::Text,
                Value::Date(_) => DataType::Date,
                Value::Timestamp(_) => DataType::Timestamp,
                _ => DataType::Text,
            },
            Expr::RelabelType { result_type, .. } => *result_type,
            Expr::OpExpr { .. } | Expr::BoolExpr { .. } => DataType::Boolean,
            Expr::SubPlanRef { .. } => DataType::Boolean,
        }
    }

    pub fn contains_subplan(&self) -> bool {
        match self {
            Expr::SubPlanRef { is_init_plan } => !is_init_plan,
            Expr::Var { .. } | Expr::Const(_) => false,
            Expr::RelabelType { arg, .. } => arg.contains_subplan(),
            Expr::OpExpr { left, right, .. } => left.contains_subplan() || right.contains_subplan(),
            Expr::BoolExpr { args, .. } => args.iter().any(|a| a.contains_subplan()),
        }
    }
}

/// The set of relids referenced anywhere in `expr`.
pub fn pull_varnos(expr: &Expr) -> RelidSet {
    let mut out = RelidSet::new();
    pull_varnos_into(expr, &mut out);
    out
}

fn pull_varnos_into(expr: &Expr, out: &mut RelidSet) {
    match expr {
        Expr::Var { varno, .. } => {
            out.insert(*varno);
        }
        Expr::Const(_) | Expr::SubPlanRef { .. } => {}
        Expr::RelabelType { arg, .. } => pull_varnos_into(arg, out),
        Expr::OpExpr { left, right, .. } => {
            pull_varnos_into(left, out);
            pull_varnos_into(right, out);
        }
        Expr::BoolExpr { args, .. } => {
            for a in args {
                pull_varnos_into(a, out);
            }
        }
    }
}

/// Cardinality of `pull_varnos(expr)`.
pub fn num_relids(expr: &Expr) -> usize {
    pull_varnos(expr).len()
}

/// A structural deep copy producing entirely fresh `Rc` allocations, so the
/// result shares no mutable subnode with `expr` — used wherever isolation
/// from the original is required (index-qual rewriting, commuted merge/hash
/// clauses, recheck clauses).
pub fn deep_copy(expr: &ExprRef) -> ExprRef {
    let copied = match expr.as_ref() {
        Expr::Var { varno, varattno, vartype } => Expr::Var {
            varno: *varno,
            varattno: *varattno,
            vartype: *vartype,
        },
        Expr::Const(v) => Expr::Const(v.clone()),
        Expr::RelabelType { arg, result_type } => Expr::RelabelType {
            arg: deep_copy(arg),
            result_type: *result_type,
        },
        Expr::OpExpr { opno, left, right, lossy } => Expr::OpExpr {
            opno: opno.clone(),
            left: deep_copy(left),
            right: deep_copy(right),
            lossy: *lossy,
        },
        Expr::BoolExpr { op, args } => Expr::BoolExpr {
            op: *op,
            args: args.iter().map(deep_copy).collect(),
        },
        Expr::SubPlanRef { is_init_plan } => Expr::SubPlanRef {
            is_init_plan: *is_init_plan,
        },
    };
    Rc::new(copied)
}

/// Structural equality for pathkey-to-targetlist matching (`tlist_member`).
/// Deliberately distinct from the pointer-identity semantics `set_difference`
/// relies on elsewhere in this stage.
pub fn expr_tree_equal(a: &Expr, b: &Expr) -> bool {
    a == b
}
