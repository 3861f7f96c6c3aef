//! Clause utilities: RestrictInfo wrapping, qual ordering, commutation, and
//! pointer-identity set difference.

use crate::plan::expr::{deep_copy, pull_varnos, Expr, ExprRef, RelidSet};
use crate::QueryContext;
use std::rc::Rc;

/// Wraps a bare clause with the optimizer metadata the search phase computed
/// (left/right relids). Stripping a `RestrictInfo` just means discarding
/// that metadata and keeping the clause handle — since `clause` is an `Rc`,
/// stripping never copies.
#[derive(Debug, Clone)]
pub struct RestrictInfo {
    pub clause: ExprRef,
    pub left_relids: RelidSet,
    pub right_relids: RelidSet,
}

impl RestrictInfo {
    /// Build a `RestrictInfo` for a binary operator clause, computing
    /// left/right relids from the clause's own operands. Clauses that are
    /// not binary `OpExpr`s (e.g. a bare `BoolExpr`) get empty relid sets on
    /// both sides; callers that need the combined set can still fall back to
    /// `pull_varnos` over the whole clause.
    pub fn wrap(clause: ExprRef) -> Self {
        let (left_relids, right_relids) = match clause.as_ref() {
            Expr::OpExpr { left, right, .. } => (pull_varnos(left), pull_varnos(right)),
            other => {
                let all = pull_varnos(other);
                (all, RelidSet::new())
            }
        };
        Self { clause, left_relids, right_relids }
    }
}

/// Strip `RestrictInfo` wrappers down to the bare clause list.
pub fn strip_restrict_infos(infos: &[RestrictInfo]) -> Vec<ExprRef> {
    infos.iter().map(|ri| ri.clause.clone()).collect()
}

/// If the query has no sublinks, return the list unchanged. Otherwise
/// stably partition so that clauses containing a `SubPlan` reference (but
/// not merely an `InitPlan` reference) move to the end.
///
/// Idempotent by construction: a second pass sees the same "subplan or not"
/// partition and is a no-op stable sort over an already-sorted key.
pub fn order_qual_clauses(ctx: &QueryContext, clauses: Vec<ExprRef>) -> Vec<ExprRef> {
    if !ctx.has_sub_links {
        return clauses;
    }
    let (mut plain, mut subplan_bearing): (Vec<_>, Vec<_>) =
        (Vec::new(), Vec::new());
    for clause in clauses {
        if clause.contains_subplan() {
            subplan_bearing.push(clause);
        } else {
            plain.push(clause);
        }
    }
    plain.append(&mut subplan_bearing);
    plain
}

/// `get_switched_clauses`: for each `RestrictInfo`-wrapped binary clause,
/// if its right-side relids are a subset of `outer_relids`, produce a
/// shallow-cloned clause with `left`/`right` swapped (the commuted form, so
/// the outer-relation variable lands on the left); otherwise pass the
/// original through unchanged. Never mutates the input.
pub fn get_switched_clauses(clauses: &[RestrictInfo], outer_relids: &RelidSet) -> Vec<ExprRef> {
    clauses
        .iter()
        .map(|ri| {
            if !ri.right_relids.is_empty() && ri.right_relids.is_subset(outer_relids) {
                commute_clause(&ri.clause)
            } else {
                ri.clause.clone()
            }
        })
        .collect()
}

/// Swap the operands of a binary operator clause, producing a fresh node
/// (the "opfuncid cache" the original clears has no analogue here, so a
/// fresh allocation is the whole of the commutation). Non-`OpExpr` clauses
/// pass through unchanged — they have no left/right to swap.
pub fn commute_clause(clause: &ExprRef) -> ExprRef {
    match clause.as_ref() {
        Expr::OpExpr { opno, left, right, lossy } => Rc::new(Expr::OpExpr {
            opno: commuted_operator(opno),
            left: right.clone(),
            right: left.clone(),
            lossy: *lossy,
        }),
        _ => clause.clone(),
    }
}

/// Operator commutator table. A real implementation would look this up in
/// the catalog; this stage only needs it for the common comparison
/// operators that appear in mergejoin/hashjoin and index-qual clauses, so a
/// small fixed table stands in for the catalog lookup rather than threading
/// a full operator-class catalog through.
fn commuted_operator(opno: &str) -> String {
    match opno {
        "<" => ">".to_string(),
        "<=" => ">=".to_string(),
        ">" => "<".to_string(),
        ">=" => "<=".to_string(),
        other => other.to_string(),
    }
}

/// `set_difference`: by pointer identity, not structural equality — callers
/// (qpqual construction) rely on this exactly.
pub fn set_difference_by_identity(a: &[ExprRef], b: &[ExprRef]) -> Vec<ExprRef> {
    a.iter()
        .filter(|x| !b.iter().any(|y| Rc::ptr_eq(x, y)))
        .cloned()
        .collect()
}

/// Deep-copy a whole conjunction (`Vec<RestrictInfo>`), used wherever the
/// spec requires isolation from the original Path-held clauses.
pub fn deep_copy_clauses(clauses: &[RestrictInfo]) -> Vec<ExprRef> {
    clauses.iter().map(|ri| deep_copy(&ri.clause)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DataType;

    fn op_clause(l_relid: u32, r_relid: u32) -> RestrictInfo {
        let l = Expr::var(l_relid, 1, DataType::Integer);
        let r = Expr::var(r_relid, 1, DataType::Integer);
        RestrictInfo::wrap(Expr::op("=", l, r, false))
    }

    #[test]
    fn switched_clauses_put_outer_relid_on_the_left() {
        let ri = op_clause(2, 1); // right side (1) is the outer relid
        let outer = RelidSet::from([1]);
        let switched = get_switched_clauses(std::slice::from_ref(&ri), &outer);
        match switched[0].as_ref() {
            Expr::OpExpr { left, .. } => match left.as_ref() {
                Expr::Var { varno, .. } => assert_eq!(*varno, 1),
                _ => panic!("expected Var"),
            },
            _ => panic!("expected OpExpr"),
        }
    }

    #[test]
    fn non_matching_clause_passes_through_unswitched() {
        let ri = op_clause(1, 2); // left side already the outer relid
        let outer = RelidSet::from([1]);
        let switched = get_switched_clauses(std::slice::from_ref(&ri), &outer);
        assert!(Rc::ptr_eq(&switched[0], &ri.clause));
    }

    #[test]
    fn set_difference_is_by_pointer_not_value() {
        let a = Expr::op("=", Expr::var(1, 1, DataType::Integer), Rc::new(Expr::Const(crate::common::Value::Integer(1))), false);
        let a_equal_but_distinct = deep_copy(&a);
        let diff = set_difference_by_identity(&[a.clone()], &[a_equal_but_distinct]);
        assert_eq!(diff.len(), 1, "structurally-equal-but-distinct Rc must not be removed");
    }

    #[test]
    fn order_qual_clauses_is_idempotent() {
        let ctx = QueryContext { has_sub_links: true, ..Default::default() };
        let plain = Expr::var(1, 1, DataType::Integer);
        let plain_clause: ExprRef = Rc::new(Expr::OpExpr {
            opno: "=".into(),
            left: plain.clone(),
            right: plain.clone(),
            lossy: false,
        });
        let subplan_clause: ExprRef = Rc::new(Expr::SubPlanRef { is_init_plan: false });
        let once = order_qual_clauses(&ctx, vec![subplan_clause.clone(), plain_clause.clone()]);
        let twice = order_qual_clauses(&ctx, once.clone());
        assert!(Rc::ptr_eq(&once[0], &twice[0]));
        assert!(Rc::ptr_eq(&once[1], &twice[1]));
        assert!(Rc::ptr_eq(&once[1], &subplan_clause));
    }
}
