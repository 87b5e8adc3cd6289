//! redb table definitions for the SlotGrid state store.

use redb::TableDefinition;

/// Task records keyed by task id.
pub const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

/// Group records keyed by group id.
pub const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Store bookkeeping. Holds the ledger version under [`VERSION_KEY`].
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const VERSION_KEY: &str = "ledger_version";

/// Shape shared by every JSON-valued table.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;
