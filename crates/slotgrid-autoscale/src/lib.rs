//! slotgrid-autoscale — desired-agent-count calculation and scale-out loop.
//!
//! Reads a `ClusterSnapshot` from the state store, reduces the task ledger
//! to feasible slot demand, and converts that demand into a number of
//! additional agents to provision.
//!
//! # Scaling Algorithm
//!
//! ```text
//! if slots_per_agent <= 0:
//!     return 0                                   // scaling disabled
//!
//! if groups non-empty:                           // grouped mode
//!     demand = Σ_group min(Σ pending(task), group.max_slots)
//!            + Σ pending(task without a known group)
//! else:                                          // ungrouped mode
//!     for task:
//!         if needed <= slots_per_agent:          // packable
//!             demand += pending(task)
//!         elif allocated == 0 and needed % slots_per_agent == 0:
//!             demand += needed                   // whole dedicated agents
//!         // started or indivisible multi-agent tasks add nothing
//!
//! agents = ceil(demand / slots_per_agent)
//! ```
//!
//! `pending(task) = max(0, needed - allocated)`. The scale bound is passed
//! through a hook that currently leaves the result unchanged.

pub mod calculator;
pub mod demand;
pub mod prometheus;
pub mod scaler;

pub use calculator::{agents_for_demand, apply_scale_bound, compute_desired_agent_count};
pub use demand::{DemandBreakdown, GroupDemand, aggregate, feasible_demand};
pub use prometheus::render_prometheus;
pub use scaler::{
    AutoscaleSettings, Autoscaler, BoxFuture, ProvisionCallback, ScaleDecision, ScaleReport,
    evaluate_snapshot,
};
