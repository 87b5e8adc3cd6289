//! slotgrid-state — task ledger and snapshot store for SlotGrid.
//!
//! Backed by [redb](https://docs.rs/redb), holds the task and group records
//! the dispatcher writes and the autoscaler reads.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns. Every
//! committing write bumps a ledger version stored in the `meta` table, and
//! [`StateStore::snapshot`] reads tasks, groups, and version inside a single
//! read transaction. Readers therefore only ever see an immutable,
//! internally-consistent [`ClusterSnapshot`], never the live tables.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod ledger;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use ledger::TaskLedger;
pub use store::StateStore;
pub use types::*;
