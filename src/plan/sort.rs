//! Sort synthesizer: given a child Plan and the ordered list of pathkeys a
//! downstream operator needs, build a Sort node whose target list carries
//! every key the caller asked for, pulling in resjunk entries for keys that
//! aren't already in the child's own target list.

use crate::common::TableId;
use crate::plan::cost::cost_sort;
use crate::plan::expr::{expr_tree_equal, pull_varnos};
use crate::plan::path::PathKey;
use crate::plan::plan::{Plan, PlanHeader, TargetEntry};
use crate::DbError;
use std::collections::BTreeSet;

/// Nodes whose target list this stage cannot freely append resjunk entries
/// to — currently only Append, whose children each have their own
/// independently-shaped target list.
fn can_evaluate_projections(plan: &Plan) -> bool {
    !matches!(plan, Plan::Append { .. })
}

fn wrap_in_result(child: Plan) -> Plan {
    let child_header = child.header().clone();
    let mut header = PlanHeader {
        targetlist: child_header.targetlist.clone(),
        ..Default::default()
    };
    header.startup_cost = child_header.startup_cost;
    header.total_cost = child_header.total_cost;
    header.plan_rows = child_header.plan_rows;
    header.plan_width = child_header.plan_width;
    Plan::Result {
        header,
        resconstantqual: Vec::new(),
        subplan: Some(Box::new(child)),
    }
}

/// Build a Sort on top of `child`, ordering by `pathkeys`. `relids` bounds
/// which relations a freshly-pulled-in sort key is allowed to reference —
/// a pathkey item that reaches outside `relids` isn't evaluable at this
/// point in the plan and is skipped in favor of the next equivalent item.
pub fn make_sort_from_pathkeys(
    child: Plan,
    relids: &BTreeSet<TableId>,
    pathkeys: &[PathKey],
    cpu_operator_cost: f64,
) -> Result<Plan, DbError> {
    let mut child = child;
    let mut sort_tlist: Vec<TargetEntry> = child
        .header()
        .targetlist
        .iter()
        .map(|te| {
            let mut fresh = te.clone();
            fresh.reskey = 0;
            fresh.reskeyop = None;
            fresh
        })
        .collect();

    let mut next_resno = sort_tlist.iter().map(|te| te.resno).max().unwrap_or(0) + 1;
    let mut keycount = 0i32;

    for pathkey in pathkeys {
        // First preference: an item already present (by structural equality)
        // in the child's own target list.
        let existing = sort_tlist.iter().position(|te| {
            pathkey.iter().any(|item| expr_tree_equal(&te.expr, &item.key))
        });

        let (target_index, chosen_sortop) = if let Some(idx) = existing {
            let sortop = pathkey
                .iter()
                .find(|item| expr_tree_equal(&sort_tlist[idx].expr, &item.key))
                .map(|item| item.sortop.clone());
            (idx, sortop)
        } else {
            let item = pathkey
                .iter()
                .find(|item| pull_varnos(item.key.as_ref()).is_subset(relids))
                .ok_or_else(|| {
                    DbError::planner(
                        "make_sort_from_pathkeys",
                        "no pathkey item is evaluable over the given relids",
                    )
                })?;

            if !can_evaluate_projections(&child) {
                child = wrap_in_result(child);
            }

            let entry = TargetEntry::new(item.key.clone(), next_resno).resjunk();
            next_resno += 1;
            child.header_mut().targetlist.push(entry.clone());
            sort_tlist.push(entry);
            (sort_tlist.len() - 1, Some(item.sortop.clone()))
        };

        if sort_tlist[target_index].reskey != 0 {
            // Already assigned by an earlier, equivalent pathkey: redundant.
            continue;
        }

        keycount += 1;
        sort_tlist[target_index].reskey = keycount;
        sort_tlist[target_index].reskeyop = chosen_sortop;
        if let Some(entry) = child
            .header_mut()
            .targetlist
            .iter_mut()
            .find(|te| te.resno == sort_tlist[target_index].resno)
        {
            entry.reskey = keycount;
            entry.reskeyop = sort_tlist[target_index].reskeyop.clone();
        }
    }

    if keycount == 0 {
        return Err(DbError::planner(
            "make_sort_from_pathkeys",
            "pathkeys list produced no sort keys",
        ));
    }

    let (startup_cost, total_cost) = cost_sort(child.header(), cpu_operator_cost);
    let header = PlanHeader {
        targetlist: sort_tlist,
        qual: Vec::new(),
        startup_cost,
        total_cost,
        plan_rows: child.header().plan_rows,
        plan_width: child.header().plan_width,
    };

    Ok(Plan::Sort {
        header,
        keycount: keycount as usize,
        lefttree: Box::new(child),
    })
}
