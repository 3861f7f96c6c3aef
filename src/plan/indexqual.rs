//! Index-qual rewriter: turns the Path's two-level OR-of-ANDs `indexqual`
//! into the executor form — index-key Vars on the left, renumbered to
//! 1-based index attribute positions — and tracks per-operator lossiness
//! for recheck.

use crate::catalog::IndexDef;
use crate::common::TableId;
use crate::plan::clauses::{commute_clause, deep_copy_clauses, RestrictInfo};
use crate::plan::expr::{deep_copy, pull_varnos, BoolOp, Expr, ExprRef};
use crate::DbError;
use std::rc::Rc;
use tracing::trace;

#[derive(Debug)]
pub struct FixedIndexQuals {
    pub fixed: Vec<Vec<ExprRef>>,
    pub recheck: Vec<Vec<ExprRef>>,
    pub orig: Vec<Vec<ExprRef>>,
}

/// Rewrite every sublist of `indexqual` against its corresponding index in
/// `indexinfo` (positionally aligned).
pub fn fix_index_quals(
    baserelid: TableId,
    indexinfo: &[IndexDef],
    indexqual: &[Vec<RestrictInfo>],
) -> Result<FixedIndexQuals, DbError> {
    if indexinfo.len() != indexqual.len() {
        return Err(DbError::planner(
            "fix_index_quals",
            "indexinfo and indexqual sublists must align positionally",
        ));
    }

    let mut fixed = Vec::with_capacity(indexqual.len());
    let mut recheck = Vec::with_capacity(indexqual.len());
    let mut orig = Vec::with_capacity(indexqual.len());

    for (index, sublist) in indexinfo.iter().zip(indexqual.iter()) {
        let mut fixed_sublist = Vec::with_capacity(sublist.len());
        let mut recheck_sublist = Vec::new();
        let mut orig_sublist = Vec::with_capacity(sublist.len());

        for ri in sublist {
            orig_sublist.push(ri.clause.clone());

            let (opno, lossy, left, right) = match ri.clause.as_ref() {
                Expr::OpExpr { opno, lossy, left, right } => (opno.clone(), *lossy, left, right),
                _ => {
                    return Err(DbError::planner(
                        "fix_index_quals",
                        "index qual clause is not a binary operator expression",
                    ))
                }
            };

            let left_is_key = pull_varnos(left) == std::iter::once(baserelid).collect();
            let right_is_key = pull_varnos(right) == std::iter::once(baserelid).collect();

            let (effective_opno, key_operand, other_operand) = if left_is_key {
                (opno.clone(), left.clone(), right.clone())
            } else if right_is_key {
                // Commute so the index key lands on the left; this is the
                // only place `commute_clause` actually runs an allocation —
                // if the key is already on the left we skip it entirely,
                // matching the original's short-circuit.
                let commuted = commute_clause(&ri.clause);
                match commuted.as_ref() {
                    Expr::OpExpr { opno, left, right, .. } => {
                        (opno.clone(), left.clone(), right.clone())
                    }
                    _ => unreachable!("commute_clause preserves OpExpr shape"),
                }
            } else {
                return Err(DbError::planner(
                    "fix_index_quals",
                    "index-key not found: neither operand references the base relation",
                ));
            };

            let stripped = strip_relabel(&key_operand);
            let key_position = match stripped.as_ref() {
                Expr::Var { varno, varattno, .. } if *varno == baserelid => {
                    index.key_position(*varattno).ok_or_else(|| {
                        DbError::planner(
                            "fix_index_quals",
                            format!("index-key not found for attribute {varattno}"),
                        )
                    })?
                }
                // Functional-index expression: replaced wholesale with
                // the index's first key position.
                _ => 1,
            };
            let key_vartype = stripped.expr_type();

            let fixed_left = Expr::var(baserelid, key_position as u16, key_vartype);
            let fixed_right = deep_copy(&other_operand);
            let requires_recheck = index.op_requires_recheck(key_position, &effective_opno);
            fixed_sublist.push(Rc::new(Expr::OpExpr {
                opno: effective_opno.clone(),
                left: fixed_left,
                right: fixed_right,
                lossy,
            }));

            if requires_recheck {
                trace!(site = "fix_index_quals", opno = %effective_opno, key_position, "lossy operator, recheck required");
                recheck_sublist.push(ri.clause.clone());
            }
        }

        fixed.push(fixed_sublist);
        recheck.push(recheck_sublist);
        orig.push(orig_sublist);
    }

    Ok(FixedIndexQuals { fixed, recheck, orig })
}

fn strip_relabel(expr: &ExprRef) -> ExprRef {
    match expr.as_ref() {
        Expr::RelabelType { arg, .. } => strip_relabel(arg),
        _ => expr.clone(),
    }
}

/// Build `OR(AND(sublist_1), AND(sublist_2), ...)` from the *original*
/// (pre-rewrite) clauses, for qpqual assembly in the multi-index case.
pub fn build_indxqual_or_expr(orig: &[Vec<ExprRef>]) -> ExprRef {
    let ands: Vec<ExprRef> = orig
        .iter()
        .map(|sublist| {
            Rc::new(Expr::BoolExpr {
                op: BoolOp::And,
                args: sublist.clone(),
            })
        })
        .collect();
    Rc::new(Expr::BoolExpr { op: BoolOp::Or, args: ands })
}

/// Deep-copy a whole OR-of-ANDs original clause list, used when injecting
/// the full re-evaluation fallback into qpqual for the multi-index recheck
/// case.
pub fn deep_copy_or_expr(expr: &ExprRef) -> ExprRef {
    deep_copy(expr)
}

/// Flatten `Vec<Vec<RestrictInfo>>` to bare clause lists, preserving
/// sublist shape — used by callers building `orig` outside the rewriter
/// (e.g. tests constructing literal Paths).
pub fn clause_lists(lists: &[Vec<RestrictInfo>]) -> Vec<Vec<ExprRef>> {
    lists.iter().map(|l| deep_copy_clauses(l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperatorClass;
    use crate::common::DataType;
    use crate::plan::clauses::RestrictInfo;

    fn idx() -> IndexDef {
        IndexDef {
            index_id: 99,
            table_id: 3,
            name: "idx".into(),
            index_keys: vec![2],
            opclasses: vec![OperatorClass::new("int4_ops").with_lossy(["&&"])],
        }
    }

    #[test]
    fn rewrites_right_side_key_by_commuting_and_renumbering() {
        let key_var = Expr::var(3, 2, DataType::Integer); // table attno 2
        let konst = Rc::new(Expr::Const(crate::common::Value::Integer(7)));
        // Constant on the left, key on the right: must commute.
        let clause = Expr::op("=", konst, key_var, false);
        let ri = RestrictInfo::wrap(clause);

        let result = fix_index_quals(3, &[idx()], &[vec![ri]]).unwrap();
        match result.fixed[0][0].as_ref() {
            Expr::OpExpr { left, .. } => match left.as_ref() {
                Expr::Var { varno, varattno, .. } => {
                    assert_eq!(*varno, 3);
                    assert_eq!(*varattno, 1, "attno 2 is the 1st (and only) index key");
                }
                _ => panic!("expected Var"),
            },
            _ => panic!("expected OpExpr"),
        }
    }

    #[test]
    fn lossy_operator_populates_recheck_sublist() {
        let key_var = Expr::var(3, 2, DataType::Integer);
        let konst = Rc::new(Expr::Const(crate::common::Value::Integer(7)));
        let clause = Expr::op("&&", key_var, konst, false);
        let ri = RestrictInfo::wrap(clause.clone());

        let result = fix_index_quals(3, &[idx()], &[vec![ri]]).unwrap();
        assert_eq!(result.recheck[0].len(), 1);
        assert!(Rc::ptr_eq(&result.recheck[0][0], &clause));
    }

    #[test]
    fn recheck_lossiness_is_checked_against_the_post_commutation_operator() {
        // ">" is lossy but "<" is not. The key is on the right, so the
        // clause commutes from "<" to ">" before the recheck lookup — if
        // lossiness were (incorrectly) checked against the pre-commutation
        // "<", no recheck would be recorded.
        let index = IndexDef {
            index_id: 100,
            table_id: 3,
            name: "idx2".into(),
            index_keys: vec![2],
            opclasses: vec![OperatorClass::new("int4_ops").with_lossy([">"])],
        };
        let key_var = Expr::var(3, 2, DataType::Integer);
        let konst = Rc::new(Expr::Const(crate::common::Value::Integer(7)));
        let clause = Expr::op("<", konst, key_var, false);
        let ri = RestrictInfo::wrap(clause);

        let result = fix_index_quals(3, &[index], &[vec![ri]]).unwrap();
        assert_eq!(result.recheck[0].len(), 1, "lossy under the commuted operator, must recheck");
    }

    #[test]
    fn non_operand_match_is_an_index_key_not_found_error() {
        let other_var = Expr::var(7, 1, DataType::Integer); // relid 7, not baserelid 3
        let konst = Rc::new(Expr::Const(crate::common::Value::Integer(7)));
        let clause = Expr::op("=", other_var, konst, false);
        let ri = RestrictInfo::wrap(clause);

        let err = fix_index_quals(3, &[idx()], &[vec![ri]]).unwrap_err();
        assert!(matches!(err, DbError::Planner { .. }));
    }
}
