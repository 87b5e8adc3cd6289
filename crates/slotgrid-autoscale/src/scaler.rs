//! Autoscaler — the control loop around the desired-agent-count calculator.
//!
//! Each tick takes a consistent snapshot from the state store, aggregates
//! demand, converts it into an agent count, and hands positive counts to a
//! provisioning callback. The actual instance launch is performed by that
//! callback; the autoscaler only counts.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use slotgrid_state::{ClusterSnapshot, StateStore};

use crate::calculator::{agents_for_demand, apply_scale_bound};
use crate::demand::{DemandBreakdown, aggregate};

/// A provisioning decision for the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Request this many additional agents.
    Provision(u32),
    /// No schedulable demand.
    NoChange,
}

/// Callback type for provisioning agents.
///
/// The autoscaler calls this with the number of additional agents wanted.
pub type ProvisionCallback = Box<dyn Fn(u32) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
>;

/// Agent shape and scale bound the calculator runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutoscaleSettings {
    /// Slots offered by one agent. Non-positive disables scaling.
    pub slots_per_agent: i32,
    /// Cluster scale bound, routed through [`apply_scale_bound`].
    pub scale_bound: i32,
}

/// Outcome of evaluating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleReport {
    /// Ledger version the report was computed from.
    pub version: u64,
    pub settings: AutoscaleSettings,
    pub demand: DemandBreakdown,
    pub desired_agents: u32,
}

impl ScaleReport {
    pub fn decision(&self) -> ScaleDecision {
        match self.desired_agents {
            0 => ScaleDecision::NoChange,
            n => ScaleDecision::Provision(n),
        }
    }
}

/// Compute the scale report for a snapshot. Pure.
pub fn evaluate_snapshot(snapshot: &ClusterSnapshot, settings: AutoscaleSettings) -> ScaleReport {
    let demand = aggregate(
        &snapshot.ledger,
        snapshot.group_map(),
        settings.slots_per_agent,
    );
    let desired_agents = apply_scale_bound(
        agents_for_demand(demand.feasible_slots, settings.slots_per_agent),
        settings.scale_bound,
    );

    ScaleReport {
        version: snapshot.version,
        settings,
        demand,
        desired_agents,
    }
}

/// The autoscaler evaluates ledger snapshots and requests agents.
///
/// Ticks run sequentially on `&mut self`, so at most one decision is in
/// flight at a time.
pub struct Autoscaler {
    state: StateStore,
    settings: AutoscaleSettings,
    /// Callback to provision agents.
    provision_fn: Option<ProvisionCallback>,
    /// Most recent report, used to reject snapshots older than it.
    last_report: Option<ScaleReport>,
}

impl Autoscaler {
    /// Create a new autoscaler.
    pub fn new(state: StateStore, settings: AutoscaleSettings) -> Self {
        Self {
            state,
            settings,
            provision_fn: None,
            last_report: None,
        }
    }

    /// Set the callback used to provision agents.
    pub fn with_provision_fn(mut self, f: ProvisionCallback) -> Self {
        self.provision_fn = Some(f);
        self
    }

    pub fn settings(&self) -> AutoscaleSettings {
        self.settings
    }

    pub fn last_report(&self) -> Option<&ScaleReport> {
        self.last_report.as_ref()
    }

    /// Evaluate a snapshot with this autoscaler's settings.
    pub fn evaluate(&self, snapshot: &ClusterSnapshot) -> ScaleReport {
        evaluate_snapshot(snapshot, self.settings)
    }

    /// Run one control-loop iteration.
    ///
    /// Returns `None` when the snapshot is older than the last one
    /// evaluated.
    pub async fn tick(&mut self) -> anyhow::Result<Option<ScaleReport>> {
        let snapshot = self.state.snapshot()?;
        self.tick_with(&snapshot).await
    }

    async fn tick_with(&mut self, snapshot: &ClusterSnapshot) -> anyhow::Result<Option<ScaleReport>> {
        if let Some(last) = &self.last_report
            && snapshot.version < last.version
        {
            warn!(
                version = snapshot.version,
                last_version = last.version,
                "skipping stale ledger snapshot"
            );
            return Ok(None);
        }

        let report = self.evaluate(snapshot);

        if report.demand.partially_allocated > 0 {
            warn!(
                version = report.version,
                tasks = report.demand.partially_allocated,
                "partially allocated tasks in ledger; their remaining slots are not counted"
            );
        }

        match report.decision() {
            ScaleDecision::Provision(agents) => {
                info!(
                    version = report.version,
                    agents,
                    feasible_slots = report.demand.feasible_slots,
                    slots_per_agent = self.settings.slots_per_agent,
                    "requesting agents"
                );
                if let Some(ref provision_fn) = self.provision_fn
                    && let Err(e) = provision_fn(agents).await
                {
                    warn!(agents, error = %e, "provisioning request failed");
                }
            }
            ScaleDecision::NoChange => {
                debug!(version = report.version, "no schedulable demand");
            }
        }

        self.last_report = Some(report.clone());
        Ok(Some(report))
    }

    /// Run the autoscaler loop.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            slots_per_agent = self.settings.slots_per_agent,
            "autoscaler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "autoscaler evaluation failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}
