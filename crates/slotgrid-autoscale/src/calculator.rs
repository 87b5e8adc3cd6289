//! Scale calculator — converts feasible slot demand into whole agents.

use slotgrid_state::{GroupMap, TaskLedger};

use crate::demand::feasible_demand;

/// Number of agents needed to run all feasible demand in the ledger.
///
/// Returns 0 when `slots_per_agent` is not positive. `scale_bound` passes
/// through [`apply_scale_bound`] and currently never changes the result.
pub fn compute_desired_agent_count(
    ledger: &TaskLedger,
    groups: Option<&GroupMap>,
    slots_per_agent: i32,
    scale_bound: i32,
) -> u32 {
    let demand = feasible_demand(ledger, groups, slots_per_agent);
    apply_scale_bound(agents_for_demand(demand, slots_per_agent), scale_bound)
}

/// Smallest agent count whose combined slots cover `demand`.
pub fn agents_for_demand(demand: u64, slots_per_agent: i32) -> u32 {
    if slots_per_agent <= 0 {
        return 0;
    }
    let agents = demand.div_ceil(slots_per_agent as u64);
    u32::try_from(agents).unwrap_or(u32::MAX)
}

/// Hook point for the cluster scale bound.
///
/// The bound is accepted and ignored: it is neither a cap on the result nor
/// an offset for agents already provisioned.
pub fn apply_scale_bound(desired_agents: u32, _scale_bound: i32) -> u32 {
    desired_agents
}
