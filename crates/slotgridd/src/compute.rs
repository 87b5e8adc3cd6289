//! One-shot mode — evaluates a ledger snapshot read from a JSON file.
//!
//! ```json
//! {
//!   "tasks":  [{ "id": "trial-1", "slots_needed": 8, "slots_allocated": 0, "group": "research" }],
//!   "groups": [{ "id": "research", "max_slots": 16, "weight": 1.0 }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use slotgrid_autoscale::{AutoscaleSettings, ScaleReport, evaluate_snapshot};
use slotgrid_state::{ClusterSnapshot, GroupRecord, TaskLedger, TaskRecord};

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    tasks: Vec<TaskRecord>,
    #[serde(default)]
    groups: Vec<GroupRecord>,
}

/// Parse a snapshot document and compute its scale report.
pub fn compute_report(input: &str, settings: AutoscaleSettings) -> anyhow::Result<ScaleReport> {
    let file: SnapshotFile = serde_json::from_str(input)?;
    let snapshot = ClusterSnapshot {
        version: 0,
        ledger: TaskLedger::from_tasks(file.tasks)?,
        groups: file.groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
    };
    debug!(
        tasks = snapshot.ledger.len(),
        groups = snapshot.groups.len(),
        "snapshot loaded"
    );
    Ok(evaluate_snapshot(&snapshot, settings))
}

/// Run the `compute` subcommand and print the report as JSON.
pub fn run_compute(path: &Path, settings: AutoscaleSettings) -> anyhow::Result<()> {
    let input = std::fs::read_to_string(path)?;
    let report = compute_report(&input, settings)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
