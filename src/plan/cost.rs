//! Cost-propagation utility: copy cost/width/row estimates from a Path (or
//! a child Plan) onto a newly created Plan. `PlanHeader`'s `Default` already
//! zero-fills when no source is given. This stage never re-costs — it only
//! mechanically propagates the numbers the Path producer already computed,
//! plus the handful of local formulas called out below for Agg/Group/
//! Unique/SetOp/Limit/Append/Result/Sort/Hash.

use crate::plan::plan::PlanHeader;

/// Copy costs and width straight from a Path's own fields. Used by the scan
/// specializers, which have nothing upstream but the Path itself.
pub fn copy_costs_from_path(
    header: &mut PlanHeader,
    startup_cost: f64,
    total_cost: f64,
    rows: f64,
    width: i32,
) {
    header.startup_cost = startup_cost;
    header.total_cost = total_cost;
    header.plan_rows = rows;
    header.plan_width = width;
}

/// Copy costs and size straight from a child Plan, unless overridden by a
/// local formula. This is the default for Material and for any node whose
/// row count isn't locally recomputed.
pub fn copy_costs_from_child(header: &mut PlanHeader, child: &PlanHeader) {
    header.startup_cost = child.startup_cost;
    header.total_cost = child.total_cost;
    header.plan_rows = child.plan_rows;
    header.plan_width = child.plan_width;
}

/// `cost_sort`: external cost model stand-in. Sort is assumed to be a full
/// in-memory sort: O(n log n) comparisons before the first row can be
/// returned, plus the per-tuple cost of reading the child back out.
pub fn cost_sort(child: &PlanHeader, cpu_operator_cost: f64) -> (f64, f64) {
    let n = child.plan_rows.max(1.0);
    let comparison_cost = 2.0 * cpu_operator_cost;
    let sort_cost = n * comparison_cost * n.log2().max(1.0);
    let startup_cost = child.total_cost + sort_cost;
    let total_cost = startup_cost + cpu_operator_cost * n;
    (startup_cost, total_cost)
}
