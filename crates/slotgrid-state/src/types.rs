//! Domain types for the SlotGrid state store.
//!
//! Tasks carry slot demand; groups carry the fair-share ceiling their member
//! tasks are admitted under. Both are serializable to/from JSON for storage
//! in redb tables and for the REST API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::TaskLedger;

/// Unique identifier for a submitted task.
pub type TaskId = String;

/// Unique identifier for a scheduling group (queue, pool, tenant).
pub type GroupId = String;

/// Group records indexed by id, as handed to the demand aggregator.
pub type GroupMap = BTreeMap<GroupId, GroupRecord>;

// ── Task ──────────────────────────────────────────────────────────

/// A unit of slot demand.
///
/// A task is normally either not started (`slots_allocated == 0`) or fully
/// allocated (`slots_allocated == slots_needed`). Anything in between is a
/// transient state that readers must tolerate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Total slots the task needs to run. Zero is allowed.
    pub slots_needed: u32,
    /// Slots currently granted by the dispatcher.
    #[serde(default)]
    pub slots_allocated: u32,
    /// Owning group, referenced by id. May dangle.
    #[serde(default)]
    pub group: Option<GroupId>,
}

impl TaskRecord {
    /// A freshly submitted, unallocated task.
    pub fn new(id: impl Into<TaskId>, slots_needed: u32) -> Self {
        Self {
            id: id.into(),
            slots_needed,
            slots_allocated: 0,
            group: None,
        }
    }

    pub fn with_allocated(mut self, slots_allocated: u32) -> Self {
        self.slots_allocated = slots_allocated;
        self
    }

    pub fn in_group(mut self, group: impl Into<GroupId>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Slots still to be granted, clipped at zero when the task is
    /// over-allocated.
    pub fn pending_slots(&self) -> u32 {
        self.slots_needed.saturating_sub(self.slots_allocated)
    }

    /// True when some, but not all, of the needed slots are granted.
    pub fn is_partially_allocated(&self) -> bool {
        self.slots_allocated > 0 && self.slots_allocated < self.slots_needed
    }
}

// ── Group ─────────────────────────────────────────────────────────

/// A fairness/isolation boundary for tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupRecord {
    pub id: GroupId,
    /// Cluster-wide slot ceiling for the group's tasks. `None` = unbounded.
    #[serde(default)]
    pub max_slots: Option<u32>,
    /// Relative share used by the fair-share dispatcher. Not consulted when
    /// counting agents.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl GroupRecord {
    pub fn new(id: impl Into<GroupId>) -> Self {
        Self {
            id: id.into(),
            max_slots: None,
            weight: default_weight(),
        }
    }

    pub fn with_max_slots(mut self, max_slots: u32) -> Self {
        self.max_slots = Some(max_slots);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Point-in-time, internally consistent view of the ledger and groups.
///
/// `version` increases with every committed write to the store, so two
/// snapshots with the same version hold identical contents.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub version: u64,
    pub ledger: TaskLedger,
    pub groups: GroupMap,
}

impl ClusterSnapshot {
    /// The group map to aggregate with, or `None` for ungrouped mode.
    pub fn group_map(&self) -> Option<&GroupMap> {
        (!self.groups.is_empty()).then_some(&self.groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_slots_clips_over_allocation() {
        assert_eq!(TaskRecord::new("t", 4).pending_slots(), 4);
        assert_eq!(TaskRecord::new("t", 4).with_allocated(1).pending_slots(), 3);
        assert_eq!(TaskRecord::new("t", 0).with_allocated(1).pending_slots(), 0);
    }

    #[test]
    fn partial_allocation_detection() {
        assert!(!TaskRecord::new("t", 4).is_partially_allocated());
        assert!(TaskRecord::new("t", 4).with_allocated(2).is_partially_allocated());
        assert!(!TaskRecord::new("t", 4).with_allocated(4).is_partially_allocated());
        assert!(!TaskRecord::new("t", 0).with_allocated(1).is_partially_allocated());
    }

    #[test]
    fn group_weight_defaults_when_missing() {
        let group: GroupRecord = serde_json::from_str(r#"{"id":"research"}"#).unwrap();
        assert_eq!(group.weight, 1.0);
        assert_eq!(group.max_slots, None);
    }

    #[test]
    fn task_defaults_when_missing() {
        let task: TaskRecord =
            serde_json::from_str(r#"{"id":"trial-1","slots_needed":2}"#).unwrap();
        assert_eq!(task, TaskRecord::new("trial-1", 2));
    }

    #[test]
    fn empty_group_map_means_ungrouped() {
        let mut snapshot = ClusterSnapshot::default();
        assert!(snapshot.group_map().is_none());

        snapshot
            .groups
            .insert("g".to_string(), GroupRecord::new("g"));
        assert_eq!(snapshot.group_map().map(|g| g.len()), Some(1));
    }
}
