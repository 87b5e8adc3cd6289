//! Demand aggregation — reduces a ledger snapshot to feasible slot demand.
//!
//! Two modes, chosen by whether a non-empty group map is supplied:
//!
//! - **Grouped**: pending slots are summed per group and clipped to the
//!   group's `max_slots`. Tasks without a resolvable group are summed
//!   without a ceiling.
//! - **Ungrouped**: tasks that fit on one agent (packable) contribute their
//!   pending slots to a shared pool. Tasks that need more than one agent
//!   (distributed) contribute their whole need only when unstarted and
//!   evenly divisible by the agent size; otherwise they contribute nothing.
//!
//! A non-positive `slots_per_agent` disables scaling and yields zero demand.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use slotgrid_state::{GroupId, GroupMap, TaskId, TaskLedger, TaskRecord};

/// Per-group contribution in grouped mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDemand {
    pub group: GroupId,
    /// Sum of member tasks' pending slots before the ceiling.
    pub pending: u64,
    pub max_slots: Option<u32>,
    /// What the group actually adds to feasible demand.
    pub counted: u64,
}

/// How a feasible demand figure was reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemandBreakdown {
    /// Slots worth provisioning for.
    pub feasible_slots: u64,
    /// Ungrouped mode: pending slots of packable tasks.
    pub pending_pool: u64,
    /// Ungrouped mode: slots of unstarted, divisible distributed tasks.
    pub distributed_slots: u64,
    /// Grouped mode: pending slots of tasks with no resolvable group.
    pub ungrouped_pending: u64,
    /// Grouped mode: one entry per group in the map, ordered by id.
    pub groups: Vec<GroupDemand>,
    /// Ungrouped mode: distributed tasks that cannot be placed at this
    /// agent size.
    pub unschedulable: Vec<TaskId>,
    /// Tasks holding some but not all of their slots. Distributed tasks in
    /// this state are treated as placed and their remainder is not counted.
    pub partially_allocated: usize,
}

/// Feasible slot demand for a ledger snapshot.
pub fn feasible_demand(
    ledger: &TaskLedger,
    groups: Option<&GroupMap>,
    slots_per_agent: i32,
) -> u64 {
    aggregate(ledger, groups, slots_per_agent).feasible_slots
}

/// Aggregate a ledger snapshot, keeping the per-component breakdown.
pub fn aggregate(
    ledger: &TaskLedger,
    groups: Option<&GroupMap>,
    slots_per_agent: i32,
) -> DemandBreakdown {
    let mut breakdown = DemandBreakdown {
        partially_allocated: ledger.iter().filter(|t| t.is_partially_allocated()).count(),
        ..DemandBreakdown::default()
    };

    if slots_per_agent <= 0 {
        return breakdown;
    }
    let slots_per_agent = slots_per_agent as u32;

    match groups {
        Some(groups) if !groups.is_empty() => aggregate_grouped(ledger, groups, &mut breakdown),
        _ => aggregate_ungrouped(ledger, slots_per_agent, &mut breakdown),
    }

    breakdown
}

fn aggregate_grouped(ledger: &TaskLedger, groups: &GroupMap, out: &mut DemandBreakdown) {
    let mut pending_by_group: BTreeMap<&str, u64> =
        groups.keys().map(|id| (id.as_str(), 0)).collect();

    for task in ledger {
        let pending = u64::from(task.pending_slots());
        match task
            .group
            .as_deref()
            .and_then(|id| pending_by_group.get_mut(id))
        {
            Some(sum) => *sum += pending,
            None => out.ungrouped_pending += pending,
        }
    }

    for (id, pending) in pending_by_group {
        let max_slots = groups.get(id).and_then(|g| g.max_slots);
        let counted = match max_slots {
            Some(ceiling) => pending.min(u64::from(ceiling)),
            None => pending,
        };
        if counted < pending {
            debug!(group = id, pending, counted, "group demand clipped to max_slots");
        }
        out.groups.push(GroupDemand {
            group: id.to_string(),
            pending,
            max_slots,
            counted,
        });
    }

    out.feasible_slots = out.groups.iter().map(|g| g.counted).sum::<u64>() + out.ungrouped_pending;
}

fn aggregate_ungrouped(ledger: &TaskLedger, slots_per_agent: u32, out: &mut DemandBreakdown) {
    for task in ledger {
        if task.slots_needed <= slots_per_agent {
            out.pending_pool += u64::from(task.pending_slots());
            continue;
        }
        let slots = distributed_contribution(task, slots_per_agent, out);
        out.distributed_slots += slots;
    }

    out.feasible_slots = out.pending_pool + out.distributed_slots;
}

/// Slots a multi-agent task adds to demand.
///
/// A started task is assumed to be fully placed. An unstarted task must fill
/// a whole number of agents to be placeable at all.
fn distributed_contribution(
    task: &TaskRecord,
    slots_per_agent: u32,
    out: &mut DemandBreakdown,
) -> u64 {
    if task.slots_allocated > 0 {
        return 0;
    }
    if task.slots_needed % slots_per_agent != 0 {
        debug!(
            task = %task.id,
            slots_needed = task.slots_needed,
            slots_per_agent,
            "distributed task unschedulable at this agent size"
        );
        out.unschedulable.push(task.id.clone());
        return 0;
    }
    u64::from(task.slots_needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotgrid_state::GroupRecord;

    fn ledger(tasks: &[(u32, u32)]) -> TaskLedger {
        TaskLedger::from_tasks(
            tasks
                .iter()
                .enumerate()
                .map(|(i, &(needed, allocated))| {
                    TaskRecord::new(format!("task{}", i + 1), needed).with_allocated(allocated)
                }),
        )
        .unwrap()
    }

    fn groups(entries: &[(&str, Option<u32>)]) -> GroupMap {
        entries
            .iter()
            .map(|&(id, max)| {
                let mut group = GroupRecord::new(id);
                group.max_slots = max;
                (id.to_string(), group)
            })
            .collect()
    }

    #[test]
    fn non_positive_agent_size_yields_zero() {
        let tasks = ledger(&[(1, 0), (8, 0), (3, 0)]);
        for spa in [0, -1, -8] {
            assert_eq!(feasible_demand(&tasks, None, spa), 0);
        }
        let g = groups(&[("g", None)]);
        assert_eq!(feasible_demand(&tasks, Some(&g), 0), 0);
    }

    #[test]
    fn packable_tasks_pool_pending_slots() {
        let tasks = ledger(&[(1, 1), (1, 0), (2, 0), (0, 0)]);
        let breakdown = aggregate(&tasks, None, 2);

        assert_eq!(breakdown.pending_pool, 3);
        assert_eq!(breakdown.distributed_slots, 0);
        assert_eq!(breakdown.feasible_slots, 3);
    }

    #[test]
    fn over_allocated_task_does_not_mask_other_demand() {
        let tasks = ledger(&[(0, 1), (1, 3), (1, 0)]);
        assert_eq!(feasible_demand(&tasks, None, 4), 1);
    }

    #[test]
    fn divisible_unstarted_distributed_task_counts_whole_need() {
        let tasks = ledger(&[(8, 0)]);
        assert_eq!(feasible_demand(&tasks, None, 4), 8);
        assert_eq!(feasible_demand(&tasks, None, 2), 8);
    }

    #[test]
    fn indivisible_distributed_task_is_unschedulable() {
        let tasks = ledger(&[(3, 0)]);
        let breakdown = aggregate(&tasks, None, 2);

        assert_eq!(breakdown.feasible_slots, 0);
        assert_eq!(breakdown.unschedulable, vec!["task1".to_string()]);
    }

    #[test]
    fn started_distributed_task_contributes_nothing() {
        // Fully and partially allocated alike.
        let tasks = ledger(&[(4, 4), (4, 1), (6, 3)]);
        let breakdown = aggregate(&tasks, None, 2);

        assert_eq!(breakdown.feasible_slots, 0);
        assert!(breakdown.unschedulable.is_empty());
        assert_eq!(breakdown.partially_allocated, 2);
    }

    #[test]
    fn mixed_distributed_scenario() {
        let tasks = ledger(&[(4, 0), (4, 1)]);
        assert_eq!(feasible_demand(&tasks, None, 2), 4);
    }

    #[test]
    fn grouped_mode_clips_to_max_slots() {
        let g = groups(&[("g1", Some(1)), ("g2", Some(2)), ("g3", None), ("g4", Some(10))]);
        let tasks = TaskLedger::from_tasks(vec![
            TaskRecord::new("task1", 1).in_group("g1"),
            TaskRecord::new("task2", 1).in_group("g1"),
            TaskRecord::new("task3", 3).in_group("g1"),
            TaskRecord::new("task4", 4).in_group("g2"),
            TaskRecord::new("task5", 1).in_group("g2"),
            TaskRecord::new("task6", 1).in_group("g3"),
            TaskRecord::new("task7", 3).in_group("g3"),
            TaskRecord::new("task8", 15).in_group("g4"),
            TaskRecord::new("task9", 10).in_group("g3"),
        ])
        .unwrap();

        let breakdown = aggregate(&tasks, Some(&g), 5);
        let counted: Vec<_> = breakdown.groups.iter().map(|d| (d.pending, d.counted)).collect();

        assert_eq!(counted, vec![(5, 1), (5, 2), (14, 14), (15, 10)]);
        assert_eq!(breakdown.feasible_slots, 27);
    }

    #[test]
    fn grouped_mode_ignores_divisibility() {
        let g = groups(&[("g", None)]);
        let tasks = TaskLedger::from_tasks(vec![
            TaskRecord::new("a", 3).in_group("g"),
            TaskRecord::new("b", 5).with_allocated(2).in_group("g"),
        ])
        .unwrap();

        assert_eq!(feasible_demand(&tasks, Some(&g), 2), 6);
    }

    #[test]
    fn grouped_mode_counts_ungrouped_and_dangling_without_ceiling() {
        let g = groups(&[("capped", Some(1))]);
        let tasks = TaskLedger::from_tasks(vec![
            TaskRecord::new("a", 4).in_group("capped"),
            TaskRecord::new("b", 4),
            TaskRecord::new("c", 3).in_group("deleted"),
        ])
        .unwrap();

        let breakdown = aggregate(&tasks, Some(&g), 2);
        assert_eq!(breakdown.ungrouped_pending, 7);
        assert_eq!(breakdown.feasible_slots, 8);
    }

    #[test]
    fn group_weight_does_not_affect_demand() {
        let mut light = groups(&[("g", Some(3))]);
        let mut heavy = light.clone();
        light.get_mut("g").unwrap().weight = 0.1;
        heavy.get_mut("g").unwrap().weight = 50.0;
        let tasks = TaskLedger::from_tasks(vec![TaskRecord::new("a", 8).in_group("g")]).unwrap();

        assert_eq!(
            feasible_demand(&tasks, Some(&light), 4),
            feasible_demand(&tasks, Some(&heavy), 4)
        );
    }

    #[test]
    fn empty_group_map_falls_back_to_ungrouped() {
        let tasks = ledger(&[(3, 0)]);
        let empty = GroupMap::new();
        assert_eq!(feasible_demand(&tasks, Some(&empty), 2), 0);
    }
}
