//! StateStore — redb-backed ledger persistence for SlotGrid.
//!
//! Provides typed CRUD operations over tasks and groups plus consistent
//! snapshots for the autoscaler. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::ledger::TaskLedger;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(TASKS).map_err(map_err!(Table))?;
        txn.open_table(GROUPS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Increment the ledger version inside an open write transaction.
    fn bump_version(txn: &WriteTransaction) -> StateResult<u64> {
        let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
        let next = meta
            .get(VERSION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0)
            + 1;
        meta.insert(VERSION_KEY, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    /// Current ledger version. Zero for a store that was never written.
    pub fn version(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        Ok(meta
            .get(VERSION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    fn put_record(&self, table_def: JsonTable, key: &str, value: &[u8]) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        let version = Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(version)
    }

    fn get_record<T: DeserializeOwned>(&self, table_def: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn delete_record(&self, table_def: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        if existed {
            Self::bump_version(&txn)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Insert or update a task record.
    pub fn put_task(&self, task: &TaskRecord) -> StateResult<()> {
        let value = serde_json::to_vec(task).map_err(map_err!(Serialize))?;
        let version = self.put_record(TASKS, &task.id, &value)?;
        debug!(task = %task.id, version, "task stored");
        Ok(())
    }

    /// Insert a new task. The existence check and the write share one
    /// write transaction, so concurrent submissions of one id cannot both
    /// succeed.
    pub fn insert_task(&self, task: &TaskRecord) -> StateResult<()> {
        let value = serde_json::to_vec(task).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            if table.get(task.id.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::DuplicateTask(task.id.clone()));
            }
            table
                .insert(task.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        let version = Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(task = %task.id, version, "task inserted");
        Ok(())
    }

    /// Get a task by id.
    pub fn get_task(&self, id: &str) -> StateResult<Option<TaskRecord>> {
        self.get_record(TASKS, id)
    }

    /// List all tasks, ordered by id.
    pub fn list_tasks(&self) -> StateResult<Vec<TaskRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        decode_all(&table)
    }

    /// Delete a task by id. Returns true if it existed.
    pub fn delete_task(&self, id: &str) -> StateResult<bool> {
        let existed = self.delete_record(TASKS, id)?;
        debug!(task = %id, existed, "task deleted");
        Ok(existed)
    }

    /// Record a slot grant or revocation for an existing task.
    pub fn set_task_allocation(&self, id: &str, slots_allocated: u32) -> StateResult<TaskRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let task = {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            let bytes = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => guard.value().to_vec(),
                None => return Err(StateError::NotFound(id.to_string())),
            };
            let mut task: TaskRecord =
                serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;
            task.slots_allocated = slots_allocated;
            let value = serde_json::to_vec(&task).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            task
        };
        let version = Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(task = %id, slots_allocated, version, "task allocation updated");
        Ok(task)
    }

    // ── Groups ─────────────────────────────────────────────────────

    /// Insert or update a group record.
    pub fn put_group(&self, group: &GroupRecord) -> StateResult<()> {
        let value = serde_json::to_vec(group).map_err(map_err!(Serialize))?;
        let version = self.put_record(GROUPS, &group.id, &value)?;
        debug!(group = %group.id, version, "group stored");
        Ok(())
    }

    /// Get a group by id.
    pub fn get_group(&self, id: &str) -> StateResult<Option<GroupRecord>> {
        self.get_record(GROUPS, id)
    }

    /// List all groups, ordered by id.
    pub fn list_groups(&self) -> StateResult<Vec<GroupRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
        decode_all(&table)
    }

    /// Delete a group by id. Returns true if it existed.
    ///
    /// Member tasks keep their (now dangling) reference and are counted as
    /// ungrouped from then on.
    pub fn delete_group(&self, id: &str) -> StateResult<bool> {
        let existed = self.delete_record(GROUPS, id)?;
        debug!(group = %id, existed, "group deleted");
        Ok(existed)
    }

    // ── Snapshots ──────────────────────────────────────────────────

    /// Read tasks, groups, and version inside one read transaction.
    ///
    /// Writers committing concurrently are invisible to the returned
    /// snapshot.
    pub fn snapshot(&self) -> StateResult<ClusterSnapshot> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;

        let version = {
            let meta = txn.open_table(META).map_err(map_err!(Table))?;
            meta.get(VERSION_KEY)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0)
        };

        // Keys are unique in the table, so upsert never replaces here.
        let mut ledger = TaskLedger::new();
        {
            let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            for task in decode_all::<TaskRecord>(&table)? {
                ledger.upsert(task);
            }
        }

        let groups: GroupMap = {
            let table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            decode_all::<GroupRecord>(&table)?
                .into_iter()
                .map(|g| (g.id.clone(), g))
                .collect()
        };

        debug!(version, tasks = ledger.len(), groups = groups.len(), "snapshot taken");

        Ok(ClusterSnapshot {
            version,
            ledger,
            groups,
        })
    }
}

/// Deserialize every value of a JSON-valued table, in key order.
fn decode_all<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> StateResult<Vec<T>> {
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let record: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        results.push(record);
    }
    Ok(results)
}
