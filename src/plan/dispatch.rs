//! Plan dispatcher and the scan/join specializers: walks a Path tree
//! bottom-up and produces the matching Plan tree, one builder call per
//! node.

use crate::common::TableId;
use crate::plan::builders::*;
use crate::plan::clauses::{
    get_switched_clauses, order_qual_clauses, set_difference_by_identity, strip_restrict_infos,
    RestrictInfo,
};
use crate::plan::expr::{pull_varnos, ExprRef, RelidSet};
use crate::plan::indexqual::{build_indxqual_or_expr, fix_index_quals};
use crate::plan::path::{JoinPathCommon, Path, ScanPathCommon};
use crate::plan::plan::{Plan, TargetEntry};
use crate::plan::sort::make_sort_from_pathkeys;
use crate::{DbError, QueryContext};

/// Entry point: turn a cost-annotated Path into an executor-ready Plan.
pub fn create_plan(ctx: &QueryContext, path: &Path) -> Result<Plan, DbError> {
    match path {
        Path::SeqScan(common) => create_seqscan_plan(ctx, common),
        Path::TidScan { common, tideval } => create_tidscan_plan(ctx, common, tideval),
        Path::SubqueryScan { common } => create_subqueryscan_plan(ctx, common),
        Path::FunctionScan { common } => create_functionscan_plan(ctx, common),
        Path::IndexScan { common, indexinfo, indexqual, indexscandir, rows } => {
            create_indexscan_plan(ctx, common, indexinfo, indexqual, *indexscandir, *rows)
        }
        Path::NestLoop(common) => create_nestloop_plan(ctx, common),
        Path::MergeJoin { common, path_mergeclauses, outersortkeys, innersortkeys } => {
            create_mergejoin_plan(ctx, common, path_mergeclauses, outersortkeys, innersortkeys)
        }
        Path::HashJoin { common, path_hashclauses } => {
            create_hashjoin_plan(ctx, common, path_hashclauses)
        }
        Path::Append { subpaths } => {
            let plans = subpaths
                .iter()
                .map(|p| create_plan(ctx, p))
                .collect::<Result<Vec<_>, _>>()?;
            let tlist = plans.first().map(|p| p.header().targetlist.clone()).unwrap_or_default();
            Ok(make_append(tlist, plans, false))
        }
        Path::Result { constantqual, subpath } => {
            let sub = subpath.as_deref().map(|p| create_plan(ctx, p)).transpose()?;
            let tlist = sub.as_ref().map(|s| s.header().targetlist.clone()).unwrap_or_default();
            let qual = strip_restrict_infos(constantqual);
            Ok(make_result(tlist, qual, sub, ctx.costs.cpu_tuple_cost))
        }
        Path::Material { subpath } => {
            let child = create_plan(ctx, subpath)?;
            let tlist = child.header().targetlist.clone();
            let startup_cost = child.header().startup_cost;
            let total_cost = child.header().total_cost;
            Ok(make_material(tlist, child, startup_cost, total_cost))
        }
    }
}

/// The set of relids a Path (at any depth) reads from, computed by walking
/// the Path tree rather than a precomputed field (only scan Paths carry a
/// `RelOptInfo` with `relids`; joins derive theirs from their children).
fn path_relids(path: &Path) -> RelidSet {
    match path {
        Path::SeqScan(c) | Path::TidScan { common: c, .. } | Path::SubqueryScan { common: c }
        | Path::FunctionScan { common: c } | Path::IndexScan { common: c, .. } => {
            c.rel.relids.iter().copied().collect()
        }
        Path::NestLoop(jc) | Path::MergeJoin { common: jc, .. } | Path::HashJoin { common: jc, .. } => {
            let mut out = path_relids(&jc.outer);
            out.extend(path_relids(&jc.inner));
            out
        }
        Path::Append { subpaths } => {
            subpaths.iter().fold(RelidSet::new(), |mut acc, p| {
                acc.extend(path_relids(p));
                acc
            })
        }
        Path::Result { subpath, .. } => subpath.as_deref().map(path_relids).unwrap_or_default(),
        Path::Material { subpath } => path_relids(subpath),
    }
}

fn scan_basics(
    ctx: &QueryContext,
    common: &ScanPathCommon,
) -> Result<(TableId, Vec<TargetEntry>, Vec<ExprRef>), DbError> {
    let scanrelid = common.rel.single_relid().ok_or_else(|| {
        DbError::planner("create_scan_plan", "scan path's relation must reference exactly one relid")
    })?;
    let tlist = common.rel.targetlist.clone();
    let qual = strip_restrict_infos(&common.rel.baserestrictinfo);
    let qual = order_qual_clauses(ctx, qual);
    Ok((scanrelid, tlist, qual))
}

fn create_seqscan_plan(ctx: &QueryContext, common: &ScanPathCommon) -> Result<Plan, DbError> {
    let (scanrelid, tlist, qual) = scan_basics(ctx, common)?;
    Ok(make_seqscan(
        tlist,
        qual,
        scanrelid,
        common.startup_cost,
        common.total_cost,
        common.rel.rows,
        common.rel.width,
    ))
}

fn create_tidscan_plan(
    ctx: &QueryContext,
    common: &ScanPathCommon,
    tideval: &ExprRef,
) -> Result<Plan, DbError> {
    let (scanrelid, tlist, qual) = scan_basics(ctx, common)?;
    Ok(make_tidscan(
        tlist,
        qual,
        scanrelid,
        tideval.clone(),
        common.startup_cost,
        common.total_cost,
        common.rel.rows,
        common.rel.width,
    ))
}

fn create_functionscan_plan(ctx: &QueryContext, common: &ScanPathCommon) -> Result<Plan, DbError> {
    let (scanrelid, tlist, qual) = scan_basics(ctx, common)?;
    Ok(make_functionscan(
        tlist,
        qual,
        scanrelid,
        common.startup_cost,
        common.total_cost,
        common.rel.rows,
        common.rel.width,
    ))
}

fn create_subqueryscan_plan(ctx: &QueryContext, common: &ScanPathCommon) -> Result<Plan, DbError> {
    let (scanrelid, tlist, qual) = scan_basics(ctx, common)?;
    let subplan_rc = common.rel.subplan.clone().ok_or_else(|| {
        DbError::planner("create_subqueryscan_plan", "subquery scan path has no materialized subplan")
    })?;
    let _ = &qual; // subquery scans have no residual baserestrictinfo of their own in this model
    Ok(make_subqueryscan(tlist, qual, scanrelid, (*subplan_rc).clone()))
}

fn create_indexscan_plan(
    ctx: &QueryContext,
    common: &ScanPathCommon,
    indexinfo: &[crate::catalog::IndexDef],
    indexqual: &[Vec<RestrictInfo>],
    indexscandir: crate::plan::path::ScanDirection,
    path_rows: f64,
) -> Result<Plan, DbError> {
    let scanrelid = common.rel.single_relid().ok_or_else(|| {
        DbError::planner("create_indexscan_plan", "index scan path's relation must reference exactly one relid")
    })?;
    let tlist = common.rel.targetlist.clone();
    let baserestrict_qual = strip_restrict_infos(&common.rel.baserestrictinfo);

    let fixed = fix_index_quals(scanrelid, indexinfo, indexqual)?;
    let used_clauses: Vec<ExprRef> = fixed.orig.iter().flatten().cloned().collect();

    let mut qpqual = if indexinfo.len() == 1 {
        set_difference_by_identity(&baserestrict_qual, &used_clauses)
    } else {
        // With more than one index ORed together, the rebuilt OR-expression
        // is a fresh node with no identity link back to the original
        // baserestrictinfo clause, so the residual is computed structurally
        // instead, and the full reconstructed OR-of-ANDs is kept as a
        // fallback re-check clause.
        use crate::plan::expr::expr_tree_equal;
        let mut residual: Vec<ExprRef> = baserestrict_qual
            .iter()
            .filter(|c| !used_clauses.iter().any(|u| expr_tree_equal(c, u)))
            .cloned()
            .collect();
        residual.push(build_indxqual_or_expr(&fixed.orig));
        residual
    };

    for recheck_sublist in &fixed.recheck {
        for clause in recheck_sublist {
            if !qpqual.iter().any(|c| std::rc::Rc::ptr_eq(c, clause)) {
                qpqual.push(clause.clone());
            }
        }
    }
    let qpqual = order_qual_clauses(ctx, qpqual);

    Ok(make_indexscan(
        tlist,
        qpqual,
        scanrelid,
        indexinfo.iter().map(|i| i.index_id).collect(),
        fixed.fixed,
        fixed.orig,
        indexscandir,
        common.startup_cost,
        common.total_cost,
        path_rows,
        common.rel.width,
    ))
}

fn join_tlist_from(outer_tl: &[TargetEntry], inner_tl: &[TargetEntry]) -> Vec<TargetEntry> {
    let mut out = Vec::with_capacity(outer_tl.len() + inner_tl.len());
    for (i, te) in outer_tl.iter().chain(inner_tl.iter()).enumerate() {
        let mut fresh = te.clone();
        fresh.resno = i as i32 + 1;
        fresh.resjunk = false;
        fresh.reskey = 0;
        fresh.reskeyop = None;
        out.push(fresh);
    }
    out
}

/// NestLoop with an inner IndexScan whose index qual already embeds a
/// clause spanning both sides of the join (a single OR-sublist clause
/// referencing 2+ relids) doesn't need that clause re-checked as part of
/// the join qual — the index scan already enforces it.
fn eliminate_nestloop_redundant_clauses(inner: &Plan, joinclauses: Vec<ExprRef>) -> Vec<ExprRef> {
    if let Plan::IndexScan { indxqualorig, .. } = inner {
        if indxqualorig.len() == 1 {
            let sublist = &indxqualorig[0];
            let mut combined_relids = RelidSet::new();
            for c in sublist {
                combined_relids.extend(pull_varnos(c));
            }
            if combined_relids.len() > 1 {
                return set_difference_by_identity(&joinclauses, sublist);
            }
        }
    }
    joinclauses
}

fn create_nestloop_plan(ctx: &QueryContext, common: &JoinPathCommon) -> Result<Plan, DbError> {
    let outer_plan = create_plan(ctx, &common.outer)?;
    let inner_plan = create_plan(ctx, &common.inner)?;

    let joinclauses = order_qual_clauses(ctx, strip_restrict_infos(&common.joinrestrictinfo));
    let joinqual = if common.jointype.is_outer() {
        joinclauses
    } else {
        eliminate_nestloop_redundant_clauses(&inner_plan, joinclauses)
    };

    let tlist = join_tlist_from(&outer_plan.header().targetlist, &inner_plan.header().targetlist);
    let width = outer_plan.header().plan_width + inner_plan.header().plan_width;

    Ok(make_nestloop(
        tlist,
        common.jointype,
        joinqual,
        Vec::new(),
        outer_plan,
        inner_plan,
        common.startup_cost,
        common.total_cost,
        common.rows,
        width,
    ))
}

fn create_mergejoin_plan(
    ctx: &QueryContext,
    common: &JoinPathCommon,
    path_mergeclauses: &[RestrictInfo],
    outersortkeys: &[crate::plan::path::PathKey],
    innersortkeys: &[crate::plan::path::PathKey],
) -> Result<Plan, DbError> {
    let outer_plan = create_plan(ctx, &common.outer)?;
    let inner_plan = create_plan(ctx, &common.inner)?;

    let outer_relids = path_relids(&common.outer);
    let inner_relids = path_relids(&common.inner);
    let cpu_operator_cost = ctx.costs.cpu_operator_cost;

    let outer_plan = if !outersortkeys.is_empty() {
        make_sort_from_pathkeys(outer_plan, &outer_relids, outersortkeys, cpu_operator_cost)?
    } else {
        outer_plan
    };
    let inner_plan = if !innersortkeys.is_empty() {
        make_sort_from_pathkeys(inner_plan, &inner_relids, innersortkeys, cpu_operator_cost)?
    } else {
        inner_plan
    };

    let mergeclauses = get_switched_clauses(path_mergeclauses, &outer_relids);
    let original_merge_clauses = strip_restrict_infos(path_mergeclauses);
    let joinclauses = set_difference_by_identity(
        &strip_restrict_infos(&common.joinrestrictinfo),
        &original_merge_clauses,
    );
    let joinqual = order_qual_clauses(ctx, joinclauses);

    let tlist = join_tlist_from(&outer_plan.header().targetlist, &inner_plan.header().targetlist);
    let width = outer_plan.header().plan_width + inner_plan.header().plan_width;

    Ok(make_mergejoin(
        tlist,
        common.jointype,
        joinqual,
        mergeclauses,
        Vec::new(),
        outer_plan,
        inner_plan,
        common.startup_cost,
        common.total_cost,
        common.rows,
        width,
    ))
}

fn create_hashjoin_plan(
    ctx: &QueryContext,
    common: &JoinPathCommon,
    path_hashclauses: &[RestrictInfo],
) -> Result<Plan, DbError> {
    let outer_plan = create_plan(ctx, &common.outer)?;
    let inner_plan = create_plan(ctx, &common.inner)?;

    let outer_relids = path_relids(&common.outer);
    let hashclauses = get_switched_clauses(path_hashclauses, &outer_relids);
    let original_hash_clauses = strip_restrict_infos(path_hashclauses);
    let joinclauses = set_difference_by_identity(
        &strip_restrict_infos(&common.joinrestrictinfo),
        &original_hash_clauses,
    );
    let joinqual = order_qual_clauses(ctx, joinclauses);

    let hash_keys: Vec<ExprRef> = hashclauses
        .iter()
        .map(|c| match c.as_ref() {
            crate::plan::expr::Expr::OpExpr { right, .. } => right.clone(),
            _ => c.clone(),
        })
        .collect();

    let inner_tlist = inner_plan.header().targetlist.clone();
    let inner_width = inner_plan.header().plan_width;
    let tlist = join_tlist_from(&outer_plan.header().targetlist, &inner_tlist);
    let width = outer_plan.header().plan_width + inner_width;

    let hash_node = make_hash(inner_tlist, hash_keys, inner_plan);

    Ok(make_hashjoin(
        tlist,
        common.jointype,
        joinqual,
        hashclauses,
        Vec::new(),
        outer_plan,
        hash_node,
        common.startup_cost,
        common.total_cost,
        common.rows,
        width,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndexDef, OperatorClass};
    use crate::common::{DataType, Value};
    use crate::plan::expr::Expr;
    use crate::plan::path::{JoinType, RelOptInfo, ScanDirection};
    use std::rc::Rc;

    fn rel(relid: TableId, rows: f64) -> Rc<RelOptInfo> {
        Rc::new(RelOptInfo {
            relids: vec![relid],
            rtekind: crate::plan::path::RteKind::Relation,
            targetlist: vec![TargetEntry::new(Expr::var(relid, 1, DataType::Integer), 1)],
            rows,
            width: 8,
            baserestrictinfo: Vec::new(),
            subplan: None,
        })
    }

    #[test]
    fn seqscan_path_produces_seqscan_plan_with_propagated_costs() {
        let ctx = QueryContext::default();
        let path = Path::SeqScan(ScanPathCommon {
            rel: rel(1, 100.0),
            startup_cost: 0.0,
            total_cost: 5.0,
        });
        let plan = create_plan(&ctx, &path).unwrap();
        match plan {
            Plan::SeqScan { header, scanrelid } => {
                assert_eq!(scanrelid, 1);
                assert_eq!(header.total_cost, 5.0);
                assert_eq!(header.plan_rows, 100.0);
            }
            _ => panic!("expected SeqScan"),
        }
    }

    #[test]
    fn nestloop_eliminates_index_embedded_join_clause() {
        let ctx = QueryContext::default();
        let outer_rel = rel(1, 10.0);
        let inner_rel = rel(2, 10.0);

        let index = IndexDef {
            index_id: 1,
            table_id: 2,
            name: "idx".into(),
            index_keys: vec![1],
            opclasses: vec![OperatorClass::new("int4_ops")],
        };
        let join_clause = RestrictInfo::wrap(Expr::op(
            "=",
            Expr::var(2, 1, DataType::Integer),
            Expr::var(1, 1, DataType::Integer),
            false,
        ));
        let inner_path = Path::IndexScan {
            common: ScanPathCommon { rel: inner_rel, startup_cost: 0.0, total_cost: 1.0 },
            indexinfo: vec![index],
            indexqual: vec![vec![join_clause.clone()]],
            indexscandir: ScanDirection::Forward,
            rows: 1.0,
        };
        let outer_path = Path::SeqScan(ScanPathCommon { rel: outer_rel, startup_cost: 0.0, total_cost: 1.0 });

        let common = JoinPathCommon {
            outer: Box::new(outer_path),
            inner: Box::new(inner_path),
            jointype: JoinType::Inner,
            joinrestrictinfo: vec![join_clause],
            startup_cost: 0.0,
            total_cost: 10.0,
            rows: 10.0,
        };
        let plan = create_nestloop_plan(&ctx, &common).unwrap();
        match plan {
            Plan::NestLoop { joinqual, .. } => {
                assert!(joinqual.is_empty(), "clause already embedded in the inner index scan");
            }
            _ => panic!("expected NestLoop"),
        }
    }

    #[test]
    fn nestloop_elimination_looks_at_the_sublists_combined_relids_not_per_clause() {
        // Two clauses in the one indxqualorig sublist, each individually
        // single-relid, but together spanning both sides of the join. Per-
        // clause filtering (checking each clause's own relid count) would
        // miss this; the whole sublist must be stripped from joinclauses.
        let ctx = QueryContext::default();
        let outer_rel = rel(1, 10.0);
        let inner_rel = rel(2, 10.0);

        let index = IndexDef {
            index_id: 1,
            table_id: 2,
            name: "idx".into(),
            index_keys: vec![1, 2],
            opclasses: vec![OperatorClass::new("int4_ops"), OperatorClass::new("int4_ops")],
        };
        let clause_a = RestrictInfo::wrap(Expr::op(
            "=",
            Expr::var(2, 1, DataType::Integer),
            Rc::new(Expr::Const(Value::Integer(5))),
            false,
        ));
        let clause_b = RestrictInfo::wrap(Expr::op(
            "=",
            Expr::var(2, 2, DataType::Integer),
            Expr::var(1, 1, DataType::Integer),
            false,
        ));
        let inner_path = Path::IndexScan {
            common: ScanPathCommon { rel: inner_rel, startup_cost: 0.0, total_cost: 1.0 },
            indexinfo: vec![index],
            indexqual: vec![vec![clause_a.clone(), clause_b.clone()]],
            indexscandir: ScanDirection::Forward,
            rows: 1.0,
        };
        let outer_path = Path::SeqScan(ScanPathCommon { rel: outer_rel, startup_cost: 0.0, total_cost: 1.0 });

        let common = JoinPathCommon {
            outer: Box::new(outer_path),
            inner: Box::new(inner_path),
            jointype: JoinType::Inner,
            joinrestrictinfo: vec![clause_a, clause_b],
            startup_cost: 0.0,
            total_cost: 10.0,
            rows: 10.0,
        };
        let plan = create_nestloop_plan(&ctx, &common).unwrap();
        match plan {
            Plan::NestLoop { joinqual, .. } => {
                assert!(joinqual.is_empty(), "whole sublist is redundant once combined relids span both sides");
            }
            _ => panic!("expected NestLoop"),
        }
    }

    #[test]
    fn hashjoin_puts_outer_relid_on_the_left_of_hashclauses() {
        let ctx = QueryContext::default();
        let outer_path = Path::SeqScan(ScanPathCommon { rel: rel(1, 10.0), startup_cost: 0.0, total_cost: 1.0 });
        let inner_path = Path::SeqScan(ScanPathCommon { rel: rel(2, 10.0), startup_cost: 0.0, total_cost: 1.0 });
        // constant-built clause with inner relid on the left, outer on the right
        let clause = RestrictInfo::wrap(Expr::op(
            "=",
            Expr::var(2, 1, DataType::Integer),
            Expr::var(1, 1, DataType::Integer),
            false,
        ));
        let common = JoinPathCommon {
            outer: Box::new(outer_path),
            inner: Box::new(inner_path),
            jointype: JoinType::Inner,
            joinrestrictinfo: vec![clause.clone()],
            startup_cost: 0.0,
            total_cost: 10.0,
            rows: 10.0,
        };
        let plan = create_hashjoin_plan(&ctx, &common, std::slice::from_ref(&clause)).unwrap();
        match plan {
            Plan::HashJoin { hashclauses, .. } => match hashclauses[0].as_ref() {
                Expr::OpExpr { left, .. } => match left.as_ref() {
                    Expr::Var { varno, .. } => assert_eq!(*varno, 1, "outer relid must be on the left"),
                    _ => panic!("expected Var"),
                },
                _ => panic!("expected OpExpr"),
            },
            _ => panic!("expected HashJoin"),
        }
    }

    #[test]
    fn result_path_without_subpath_yields_single_row_plan() {
        let ctx = QueryContext::default();
        let clause = RestrictInfo::wrap(Rc::new(Expr::Const(Value::Boolean(true))));
        let path = Path::Result { constantqual: vec![clause], subpath: None };
        let plan = create_plan(&ctx, &path).unwrap();
        match plan {
            Plan::Result { header, subplan, .. } => {
                assert!(subplan.is_none());
                assert_eq!(header.plan_rows, 1.0);
            }
            _ => panic!("expected Result"),
        }
    }
}
