//! TaskLedger — ordered, id-keyed collection of live tasks.
//!
//! Iteration follows insertion order. Lookups go through an id → position
//! index, which is rebuilt for the shifted tail on removal.

use std::collections::HashMap;

use crate::error::{StateError, StateResult};
use crate::types::{TaskId, TaskRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskLedger {
    tasks: Vec<TaskRecord>,
    index: HashMap<TaskId, usize>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from records, rejecting duplicate ids.
    pub fn from_tasks(tasks: impl IntoIterator<Item = TaskRecord>) -> StateResult<Self> {
        let mut ledger = Self::new();
        for task in tasks {
            ledger.insert(task)?;
        }
        Ok(ledger)
    }

    /// Add a newly submitted task.
    pub fn insert(&mut self, task: TaskRecord) -> StateResult<()> {
        if self.index.contains_key(&task.id) {
            return Err(StateError::DuplicateTask(task.id));
        }
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Insert or replace a task in place. Returns the previous record.
    pub fn upsert(&mut self, task: TaskRecord) -> Option<TaskRecord> {
        match self.index.get(&task.id) {
            Some(&pos) => Some(std::mem::replace(&mut self.tasks[pos], task)),
            None => {
                self.index.insert(task.id.clone(), self.tasks.len());
                self.tasks.push(task);
                None
            }
        }
    }

    /// Remove a completed or cancelled task.
    pub fn remove(&mut self, id: &str) -> Option<TaskRecord> {
        let pos = self.index.remove(id)?;
        let removed = self.tasks.remove(pos);
        for (offset, task) in self.tasks[pos..].iter().enumerate() {
            self.index.insert(task.id.clone(), pos + offset);
        }
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    /// Record a grant or revocation of slots for a task.
    pub fn set_allocation(&mut self, id: &str, slots_allocated: u32) -> StateResult<()> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        self.tasks[pos].slots_allocated = slots_allocated;
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskRecord> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<'a> IntoIterator for &'a TaskLedger {
    type Item = &'a TaskRecord;
    type IntoIter = std::slice::Iter<'a, TaskRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ledger: &TaskLedger) -> Vec<&str> {
        ledger.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn insert_preserves_order() {
        let mut ledger = TaskLedger::new();
        ledger.insert(TaskRecord::new("c", 1)).unwrap();
        ledger.insert(TaskRecord::new("a", 1)).unwrap();
        ledger.insert(TaskRecord::new("b", 1)).unwrap();

        assert_eq!(ids(&ledger), vec!["c", "a", "b"]);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut ledger = TaskLedger::new();
        ledger.insert(TaskRecord::new("a", 1)).unwrap();

        let err = ledger.insert(TaskRecord::new("a", 2)).unwrap_err();
        assert!(matches!(err, StateError::DuplicateTask(id) if id == "a"));
        assert_eq!(ledger.get("a").unwrap().slots_needed, 1);
    }

    #[test]
    fn from_tasks_rejects_duplicates() {
        let result = TaskLedger::from_tasks(vec![TaskRecord::new("a", 1), TaskRecord::new("a", 1)]);
        assert!(result.is_err());
    }

    #[test]
    fn remove_reindexes_tail() {
        let mut ledger = TaskLedger::from_tasks(vec![
            TaskRecord::new("a", 1),
            TaskRecord::new("b", 2),
            TaskRecord::new("c", 3),
        ])
        .unwrap();

        let removed = ledger.remove("a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(ids(&ledger), vec!["b", "c"]);
        assert_eq!(ledger.get("c").unwrap().slots_needed, 3);
        assert!(ledger.remove("a").is_none());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut ledger =
            TaskLedger::from_tasks(vec![TaskRecord::new("a", 1), TaskRecord::new("b", 1)]).unwrap();

        let previous = ledger.upsert(TaskRecord::new("a", 8));
        assert_eq!(previous.map(|t| t.slots_needed), Some(1));
        assert_eq!(ids(&ledger), vec!["a", "b"]);
        assert_eq!(ledger.get("a").unwrap().slots_needed, 8);

        assert!(ledger.upsert(TaskRecord::new("c", 1)).is_none());
        assert_eq!(ids(&ledger), vec!["a", "b", "c"]);
    }

    #[test]
    fn set_allocation_grants_and_revokes() {
        let mut ledger = TaskLedger::from_tasks(vec![TaskRecord::new("a", 4)]).unwrap();

        ledger.set_allocation("a", 4).unwrap();
        assert_eq!(ledger.get("a").unwrap().pending_slots(), 0);

        ledger.set_allocation("a", 0).unwrap();
        assert_eq!(ledger.get("a").unwrap().pending_slots(), 4);

        assert!(matches!(
            ledger.set_allocation("missing", 1),
            Err(StateError::NotFound(_))
        ));
    }
}
