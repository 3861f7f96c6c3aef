//! Plan-node builders: one constructor per leaf/interior Plan variant. Each
//! takes whatever the corresponding Path (or an already-built child Plan)
//! supplies and fills in cost, width, and row estimates — either by
//! propagating them straight through or, for the handful of nodes that
//! locally recompute row counts (Agg, Group, Unique, SetOp, Limit, Append,
//! Result), by the formula below.

use crate::common::TableId;
use crate::plan::cost::{copy_costs_from_child, copy_costs_from_path};
use crate::plan::expr::ExprRef;
use crate::plan::path::{JoinType, ScanDirection};
use crate::plan::plan::{HashNode, Plan, PlanHeader, SetOpCmd, TargetEntry};
use crate::QueryContext;

fn header_with_tlist(targetlist: Vec<TargetEntry>) -> PlanHeader {
    PlanHeader { targetlist, ..Default::default() }
}

pub fn make_seqscan(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    scanrelid: TableId,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::SeqScan { header, scanrelid }
}

pub fn make_tidscan(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    scanrelid: TableId,
    tideval: ExprRef,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::TidScan { header, scanrelid, tideval }
}

pub fn make_functionscan(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    scanrelid: TableId,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::FunctionScan { header, scanrelid }
}

/// The subquery's own already-planned subplan supplies the costs: a
/// SubqueryScan does no work of its own beyond pulling rows through.
pub fn make_subqueryscan(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    scanrelid: TableId,
    subplan: Plan,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_child(&mut header, subplan.header());
    Plan::SubqueryScan { header, scanrelid, subplan: Box::new(subplan) }
}

#[allow(clippy::too_many_arguments)]
pub fn make_indexscan(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    scanrelid: TableId,
    indxid: Vec<u32>,
    indxqual: Vec<Vec<ExprRef>>,
    indxqualorig: Vec<Vec<ExprRef>>,
    indxorderdir: ScanDirection,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::IndexScan {
        header,
        scanrelid,
        indxid,
        indxqual,
        indxqualorig,
        indxorderdir,
    }
}

pub fn make_nestloop(
    targetlist: Vec<TargetEntry>,
    jointype: JoinType,
    joinqual: Vec<ExprRef>,
    qual: Vec<ExprRef>,
    lefttree: Plan,
    righttree: Plan,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::NestLoop {
        header,
        jointype,
        joinqual,
        lefttree: Box::new(lefttree),
        righttree: Box::new(righttree),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn make_mergejoin(
    targetlist: Vec<TargetEntry>,
    jointype: JoinType,
    joinqual: Vec<ExprRef>,
    mergeclauses: Vec<ExprRef>,
    qual: Vec<ExprRef>,
    lefttree: Plan,
    righttree: Plan,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::MergeJoin {
        header,
        jointype,
        joinqual,
        mergeclauses,
        lefttree: Box::new(lefttree),
        righttree: Box::new(righttree),
    }
}

pub fn make_hash(targetlist: Vec<TargetEntry>, hashkeys: Vec<ExprRef>, lefttree: Plan) -> HashNode {
    let mut header = header_with_tlist(targetlist);
    header.startup_cost = lefttree.header().total_cost;
    header.total_cost = lefttree.header().total_cost;
    header.plan_rows = lefttree.header().plan_rows;
    header.plan_width = lefttree.header().plan_width;
    HashNode { header, hashkeys, lefttree: Box::new(lefttree) }
}

#[allow(clippy::too_many_arguments)]
pub fn make_hashjoin(
    targetlist: Vec<TargetEntry>,
    jointype: JoinType,
    joinqual: Vec<ExprRef>,
    hashclauses: Vec<ExprRef>,
    qual: Vec<ExprRef>,
    lefttree: Plan,
    righttree: HashNode,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    copy_costs_from_path(&mut header, startup_cost, total_cost, rows, width);
    Plan::HashJoin {
        header,
        jointype,
        joinqual,
        hashclauses,
        lefttree: Box::new(lefttree),
        righttree: Box::new(righttree),
    }
}

/// Append's own estimates are a roll-up of its children's: total cost and
/// row count sum, width takes the widest child, and startup cost is the
/// first child's (the first child's first tuple is the soonest available).
pub fn make_append(targetlist: Vec<TargetEntry>, appendplans: Vec<Plan>, is_target: bool) -> Plan {
    let mut header = header_with_tlist(targetlist);
    let mut total_cost = 0.0;
    let mut plan_rows = 0.0;
    let mut plan_width = 0;
    for (i, child) in appendplans.iter().enumerate() {
        let h = child.header();
        if i == 0 {
            header.startup_cost = h.startup_cost;
        }
        total_cost += h.total_cost;
        plan_rows += h.plan_rows;
        plan_width = plan_width.max(h.plan_width);
    }
    header.total_cost = total_cost;
    header.plan_rows = plan_rows;
    header.plan_width = plan_width;
    Plan::Append { header, appendplans, is_target }
}

/// Result with no subplan (a constant projection) costs a single tuple's
/// worth of evaluation; with a subplan, its costs are the subplan's plus
/// the cost of evaluating `resconstantqual` once per row.
pub fn make_result(
    targetlist: Vec<TargetEntry>,
    resconstantqual: Vec<ExprRef>,
    subplan: Option<Plan>,
    cpu_tuple_cost: f64,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    // A resconstantqual is evaluated once, at startup, so its cost is added
    // to both startup_cost and total_cost per the qual-evaluation rule.
    let qual_cost = cpu_tuple_cost * resconstantqual.len() as f64;
    match &subplan {
        Some(sub) => {
            let h = sub.header();
            header.startup_cost = h.startup_cost + qual_cost;
            header.total_cost = h.total_cost + qual_cost;
            header.plan_rows = h.plan_rows;
            header.plan_width = h.plan_width;
        }
        None => {
            header.startup_cost = qual_cost;
            header.total_cost = cpu_tuple_cost + qual_cost;
            header.plan_rows = 1.0;
            header.plan_width = 0;
        }
    }
    Plan::Result { header, resconstantqual, subplan: subplan.map(Box::new) }
}

/// Material has no formula of its own: the caller (the join specializer
/// inserting a materialize node to avoid re-scanning an inner path) already
/// knows the right costs from the Path that called for it.
pub fn make_material(
    targetlist: Vec<TargetEntry>,
    lefttree: Plan,
    startup_cost: f64,
    total_cost: f64,
) -> Plan {
    let mut header = header_with_tlist(targetlist);
    header.plan_rows = lefttree.header().plan_rows;
    header.plan_width = lefttree.header().plan_width;
    header.startup_cost = startup_cost;
    header.total_cost = total_cost;
    Plan::Material { header, lefttree: Box::new(lefttree) }
}

/// Aggregation's row count is 1 for an ungrouped aggregate, else the
/// caller-estimated number of groups. Cost adds one qual/target-list
/// evaluation per input row on top of the child's total cost.
pub fn make_agg(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    grouped: bool,
    num_groups: f64,
    lefttree: Plan,
    cpu_operator_cost: f64,
) -> Plan {
    let child_rows = lefttree.header().plan_rows;
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    header.plan_rows = if grouped { num_groups } else { 1.0 };
    header.plan_width = lefttree.header().plan_width;
    header.startup_cost = lefttree.header().total_cost;
    header.total_cost =
        lefttree.header().total_cost + cpu_operator_cost * child_rows.max(1.0);
    Plan::Agg { header, grouped, num_groups, lefttree: Box::new(lefttree) }
}

pub fn make_group(
    targetlist: Vec<TargetEntry>,
    qual: Vec<ExprRef>,
    num_groups: f64,
    lefttree: Plan,
    cpu_operator_cost: f64,
) -> Plan {
    let child_rows = lefttree.header().plan_rows;
    let mut header = header_with_tlist(targetlist);
    header.qual = qual;
    header.plan_rows = num_groups;
    header.plan_width = lefttree.header().plan_width;
    header.startup_cost = lefttree.header().total_cost;
    header.total_cost =
        lefttree.header().total_cost + cpu_operator_cost * child_rows.max(1.0);
    Plan::Group { header, num_groups, lefttree: Box::new(lefttree) }
}

/// Unique keeps its child's row estimate as a placeholder (an exact count
/// requires runtime knowledge of duplicate density) and folds in one
/// comparison per distinct column per input row. `distinct_tlist` is the
/// subset of the child's own target-list entries being compared, mapped
/// down to 1-based attribute numbers (`uniq_cols`).
pub fn make_unique(
    targetlist: Vec<TargetEntry>,
    distinct_tlist: &[ExprRef],
    lefttree: Plan,
    cpu_operator_cost: f64,
) -> Plan {
    use crate::plan::expr::expr_tree_equal;
    let uniq_cols: Vec<i32> = distinct_tlist
        .iter()
        .filter_map(|d| {
            lefttree
                .header()
                .targetlist
                .iter()
                .find(|te| expr_tree_equal(&te.expr, d))
                .map(|te| te.resno)
        })
        .collect();

    let child_rows = lefttree.header().plan_rows;
    let mut header = header_with_tlist(targetlist);
    header.plan_rows = child_rows;
    header.plan_width = lefttree.header().plan_width;
    header.startup_cost = lefttree.header().total_cost;
    header.total_cost = lefttree.header().total_cost
        + cpu_operator_cost * child_rows.max(1.0) * uniq_cols.len().max(1) as f64;
    Plan::Unique { header, uniq_cols, lefttree: Box::new(lefttree) }
}

/// SetOp behaves like Unique but over the flagged union of two inputs
/// already concatenated upstream, so its row estimate is a fraction (10%,
/// floored at 1) of its child's rows rather than a pass-through count.
pub fn make_setop(
    targetlist: Vec<TargetEntry>,
    cmd: SetOpCmd,
    flag_col: i32,
    dup_cols: Vec<i32>,
    lefttree: Plan,
    cpu_operator_cost: f64,
) -> Plan {
    let child_rows = lefttree.header().plan_rows;
    let mut header = header_with_tlist(targetlist);
    header.plan_rows = (child_rows * 0.1).max(1.0);
    header.plan_width = lefttree.header().plan_width;
    header.startup_cost = lefttree.header().total_cost;
    header.total_cost = lefttree.header().total_cost
        + cpu_operator_cost * child_rows.max(1.0) * dup_cols.len().max(1) as f64;
    Plan::SetOp { header, cmd, flag_col, dup_cols, lefttree: Box::new(lefttree) }
}

/// Limit's cost is its child's cost scaled down proportionally to the
/// fraction of rows it actually returns; a non-constant offset/count
/// defeats this and falls back to the child's own costs unscaled, since
/// the true row count can't be known until execution.
pub fn make_limit(
    targetlist: Vec<TargetEntry>,
    limit_offset: Option<ExprRef>,
    limit_count: Option<ExprRef>,
    lefttree: Plan,
) -> Plan {
    use crate::plan::expr::Expr;
    use crate::common::Value;

    fn as_constant_f64(expr: &Option<ExprRef>) -> Option<f64> {
        match expr.as_deref()? {
            Expr::Const(Value::Integer(n)) => Some(*n as f64),
            Expr::Const(Value::Float(f)) => Some(*f),
            _ => None,
        }
    }

    let child_rows = lefttree.header().plan_rows.max(1.0);
    let child_startup = lefttree.header().startup_cost;
    let child_total = lefttree.header().total_cost;

    let mut header = header_with_tlist(targetlist);
    header.plan_width = lefttree.header().plan_width;
    header.plan_rows = child_rows;
    header.startup_cost = child_startup;
    header.total_cost = child_total;

    // Offset and count are independent adjustments: a constant offset alone
    // (no count) still shrinks plan_rows and advances startup_cost, and a
    // non-constant count no longer suppresses the offset adjustment.
    if let Some(offset) = as_constant_f64(&limit_offset).map(|o| o.max(0.0)) {
        header.plan_rows = (child_rows - offset).max(1.0);
        let fraction = (offset / child_rows).min(1.0);
        header.startup_cost = child_startup + (child_total - child_startup) * fraction;
    }

    if let Some(count) = as_constant_f64(&limit_count).map(|c| c.max(0.0)) {
        let returned = count.min(header.plan_rows).max(1.0);
        let fraction = (returned / child_rows).min(1.0);
        header.plan_rows = returned;
        header.total_cost = child_startup + (child_total - child_startup) * fraction;
    }

    Plan::Limit { header, limit_offset, limit_count, lefttree: Box::new(lefttree) }
}

/// Reorder a qual list according to query context, shared by the scan and
/// join specializers so both apply the same subplan-trailing convention.
pub fn reorder_quals(ctx: &QueryContext, clauses: Vec<ExprRef>) -> Vec<ExprRef> {
    crate::plan::clauses::order_qual_clauses(ctx, clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DataType, Value};
    use crate::plan::expr::Expr;

    fn tlist() -> Vec<TargetEntry> {
        vec![TargetEntry::new(Expr::var(1, 1, DataType::Integer), 1)]
    }

    #[test]
    fn append_sums_total_cost_and_rows_takes_widest_child_and_first_startup() {
        let a = make_seqscan(tlist(), vec![], 1, 1.0, 10.0, 100.0, 8);
        let b = make_seqscan(tlist(), vec![], 2, 2.0, 20.0, 200.0, 16);
        let append = make_append(tlist(), vec![a, b], false);
        match append {
            Plan::Append { header, .. } => {
                assert_eq!(header.startup_cost, 1.0);
                assert_eq!(header.total_cost, 30.0);
                assert_eq!(header.plan_rows, 300.0);
                assert_eq!(header.plan_width, 16);
            }
            _ => panic!("expected Append"),
        }
    }

    #[test]
    fn result_without_subplan_returns_exactly_one_row() {
        let result = make_result(tlist(), vec![], None, 0.0025);
        match result {
            Plan::Result { header, .. } => {
                assert_eq!(header.plan_rows, 1.0);
                assert_eq!(header.startup_cost, 0.0);
            }
            _ => panic!("expected Result"),
        }
    }

    #[test]
    fn agg_ungrouped_always_returns_one_row() {
        let child = make_seqscan(tlist(), vec![], 1, 0.0, 10.0, 100.0, 8);
        let agg = make_agg(tlist(), vec![], false, 0.0, child, 0.0025);
        match agg {
            Plan::Agg { header, .. } => assert_eq!(header.plan_rows, 1.0),
            _ => panic!("expected Agg"),
        }
    }

    #[test]
    fn limit_with_constant_count_scales_cost_proportionally() {
        let child = make_seqscan(tlist(), vec![], 1, 0.0, 100.0, 1000.0, 8);
        let count = Some(Expr::var(0, 0, DataType::Integer));
        // Replace with a literal constant instead of a Var for this test.
        let count = count.map(|_| std::rc::Rc::new(Expr::Const(Value::Integer(100))));
        let limit = make_limit(tlist(), None, count, child);
        match limit {
            Plan::Limit { header, .. } => {
                assert_eq!(header.plan_rows, 100.0);
                assert!(header.total_cost < 100.0, "should be cheaper than scanning everything");
            }
            _ => panic!("expected Limit"),
        }
    }

    #[test]
    fn limit_with_non_constant_count_falls_back_to_child_costs() {
        let child = make_seqscan(tlist(), vec![], 1, 0.0, 100.0, 1000.0, 8);
        let count = Some(Expr::var(5, 1, DataType::Integer));
        let limit = make_limit(tlist(), None, count, child);
        match limit {
            Plan::Limit { header, .. } => {
                assert_eq!(header.plan_rows, 1000.0);
                assert_eq!(header.total_cost, 100.0);
            }
            _ => panic!("expected Limit"),
        }
    }

    #[test]
    fn limit_offset_larger_than_child_rows_floors_plan_rows_at_one() {
        let child = make_seqscan(tlist(), vec![], 1, 0.0, 10.0, 5.0, 8);
        let offset = Some(std::rc::Rc::new(Expr::Const(Value::Integer(10))));
        let limit = make_limit(tlist(), offset, None, child);
        match limit {
            Plan::Limit { header, .. } => assert_eq!(header.plan_rows, 1.0),
            _ => panic!("expected Limit"),
        }
    }

    #[test]
    fn limit_with_constant_offset_alone_still_adjusts_cost() {
        let child = make_seqscan(tlist(), vec![], 1, 0.0, 100.0, 1000.0, 8);
        let offset = Some(std::rc::Rc::new(Expr::Const(Value::Integer(500))));
        let limit = make_limit(tlist(), offset, None, child);
        match limit {
            Plan::Limit { header, .. } => {
                assert_eq!(header.plan_rows, 500.0);
                assert!(header.startup_cost > 0.0, "offset alone must advance startup_cost");
            }
            _ => panic!("expected Limit"),
        }
    }

    #[test]
    fn result_without_subplan_bases_cost_on_cpu_tuple_cost() {
        let result = make_result(tlist(), vec![], None, 0.02);
        match result {
            Plan::Result { header, .. } => {
                assert_eq!(header.total_cost, 0.02);
                assert_eq!(header.startup_cost, 0.0);
            }
            _ => panic!("expected Result"),
        }
    }

    #[test]
    fn result_constant_qual_cost_is_added_to_both_startup_and_total() {
        let qual = vec![Expr::op("=", tlist()[0].expr.clone(), tlist()[0].expr.clone(), false)];
        let result = make_result(tlist(), qual, None, 0.02);
        match result {
            Plan::Result { header, .. } => {
                assert_eq!(header.startup_cost, 0.02);
                assert_eq!(header.total_cost, 0.02 + 0.02);
            }
            _ => panic!("expected Result"),
        }
    }
}
