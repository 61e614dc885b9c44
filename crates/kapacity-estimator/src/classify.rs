//! Per-node capacity classification.
//!
//! Turns a [`NodeSnapshot`] into a utilization report, a spinnable replica
//! count and an overcommit verdict.

use serde::{Deserialize, Serialize};

use crate::config::OvercommitThresholds;
use crate::feasibility::estimate;
use crate::node::NodeSnapshot;
use crate::types::ResourceAsk;

/// Claimed resources as percentages of allocatable resources.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Utilization {
    /// CPU requests over allocatable CPU.
    pub cpu_requested_pct: f64,
    /// Memory requests over allocatable memory.
    pub memory_requested_pct: f64,
    /// CPU limits over allocatable CPU.
    pub cpu_limit_pct: f64,
    /// Memory limits over allocatable memory.
    pub memory_limit_pct: f64,
}

impl Utilization {
    /// Compute utilization for a snapshot.
    #[must_use]
    pub fn of(snapshot: &NodeSnapshot) -> Self {
        let used = &snapshot.consumption;
        let alloc = &snapshot.allocatable;
        Self {
            cpu_requested_pct: percent(used.cpu_requested, alloc.cpu_millicores),
            memory_requested_pct: percent(used.memory_requested, alloc.memory_bytes),
            cpu_limit_pct: percent(used.cpu_limit, alloc.cpu_millicores),
            memory_limit_pct: percent(used.memory_limit, alloc.memory_bytes),
        }
    }
}

/// Per-node outcome of a capacity estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityResult {
    /// Node name.
    pub node: String,
    /// Current utilization.
    pub utilization: Utilization,
    /// Live workloads on the node.
    pub live_workloads: u64,
    /// Allocatable CPU not yet requested, in millicores.
    pub remaining_cpu: u64,
    /// Allocatable memory not yet requested, in bytes.
    pub remaining_memory: u64,
    /// Additional replicas the node can accept.
    pub spinnable: u64,
    /// Not enough CPU is left for one replica.
    pub cpu_crunch: bool,
    /// Not enough memory is left for one replica.
    pub memory_crunch: bool,
    /// Limits on the node risk exceeding what it can deliver.
    pub overcommit_risk: bool,
}

/// Classify a node against a replica's requests and limits.
///
/// The spinnable count never exceeds the node's free pod slots
/// (allocatable pods minus live workloads).
#[must_use]
pub fn classify(
    snapshot: &NodeSnapshot,
    request: &ResourceAsk,
    limit: &ResourceAsk,
    thresholds: &OvercommitThresholds,
) -> FeasibilityResult {
    let used = &snapshot.consumption;
    let alloc = &snapshot.allocatable;

    let utilization = Utilization::of(snapshot);
    let remaining_cpu = alloc.cpu_millicores.saturating_sub(used.cpu_requested);
    let remaining_memory = alloc.memory_bytes.saturating_sub(used.memory_requested);

    let result = estimate(remaining_cpu, remaining_memory, request, alloc.pods);
    let free_slots = alloc.pods.saturating_sub(used.live_workloads);

    FeasibilityResult {
        node: snapshot.name.clone(),
        utilization,
        live_workloads: used.live_workloads,
        remaining_cpu,
        remaining_memory,
        spinnable: result.spinnable.min(free_slots),
        cpu_crunch: result.cpu_crunch,
        memory_crunch: result.memory_crunch,
        overcommit_risk: is_overcommitted(snapshot, &utilization, limit, thresholds),
    }
}

/// Check whether adding one replica's limits risks overcommitting the node.
///
/// Combined percentages compare the limit ask plus existing limits against
/// capacity. Node percentages compare existing limits against allocatable
/// and are truncated to whole percent before the comparison.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn is_overcommitted(
    snapshot: &NodeSnapshot,
    utilization: &Utilization,
    limit: &ResourceAsk,
    thresholds: &OvercommitThresholds,
) -> bool {
    let used = &snapshot.consumption;
    let capacity = &snapshot.capacity;

    let combined_cpu = whole_percent(
        limit.cpu_millicores.saturating_add(used.cpu_limit),
        capacity.cpu_millicores,
    );
    let combined_memory = whole_percent(
        limit.memory_bytes.saturating_add(used.memory_limit),
        capacity.memory_bytes,
    );

    combined_memory > thresholds.combined_memory_pct
        || combined_cpu > thresholds.combined_cpu_pct
        || utilization.cpu_limit_pct as i64 > clamp_i64(thresholds.node_cpu_limit_pct)
        || utilization.memory_limit_pct as i64 > clamp_i64(thresholds.node_memory_limit_pct)
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn whole_percent(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    u64::try_from(u128::from(part) * 100 / u128::from(whole)).unwrap_or(u64::MAX)
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
