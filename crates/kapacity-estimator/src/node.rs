//! Node state as reported by the cluster data source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EstimatorConfig;
use crate::types::NodeConsumption;

/// The condition type that must report `"True"`.
const READY_CONDITION: &str = "Ready";

/// CPU, memory and pod-count figures of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeResources {
    /// CPU in millicores.
    pub cpu_millicores: u64,
    /// Memory in bytes.
    pub memory_bytes: u64,
    /// Pod-count ceiling.
    pub pods: u64,
}

/// A status condition reported by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCondition {
    /// Condition type, e.g. `Ready` or `MemoryPressure`.
    pub kind: String,
    /// Condition status: `True`, `False` or `Unknown`.
    pub status: String,
}

impl NodeCondition {
    /// Create a condition.
    #[must_use]
    pub fn new(kind: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            status: status.into(),
        }
    }

    /// Check if this condition reports a healthy node.
    ///
    /// `Ready` must be `True`; every other condition is a pressure or
    /// problem indicator and must be `False`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        if self.kind == READY_CONDITION {
            self.status == "True"
        } else {
            self.status == "False"
        }
    }
}

/// Health verdict for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum NodeHealth {
    /// Every reported condition passed.
    Healthy,
    /// At least one condition failed; the first failing one is kept.
    Unhealthy {
        /// The failing condition.
        condition: NodeCondition,
    },
}

impl NodeHealth {
    /// Check if the node is healthy.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Runs workloads and contributes capacity.
    Worker,
    /// Runs the control plane; excluded from capacity.
    ControlPlane,
    /// Carries no recognized role label; excluded from capacity.
    Unknown,
}

impl NodeRole {
    /// Determine a node's role from its labels.
    ///
    /// The worker label wins when set to `"true"`. Otherwise any configured
    /// control-plane label marks a control-plane node, whatever its value.
    #[must_use]
    pub fn from_labels(labels: &BTreeMap<String, String>, config: &EstimatorConfig) -> Self {
        if labels
            .get(&config.worker_role_label)
            .is_some_and(|value| value == "true")
        {
            return Self::Worker;
        }
        if config
            .control_plane_role_labels
            .iter()
            .any(|label| labels.contains_key(label))
        {
            return Self::ControlPlane;
        }
        Self::Unknown
    }
}

/// A node as listed by the cluster data source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Full node name.
    pub name: String,
    /// Node labels.
    pub labels: BTreeMap<String, String>,
    /// Status conditions in reported order.
    pub conditions: Vec<NodeCondition>,
    /// Total node resources.
    pub capacity: NodeResources,
    /// Capacity minus system reservations.
    pub allocatable: NodeResources,
}

impl NodeInfo {
    /// Evaluate the node's health over all of its conditions.
    ///
    /// A node reporting no conditions is healthy.
    #[must_use]
    pub fn health(&self) -> NodeHealth {
        match self.conditions.iter().find(|c| !c.is_healthy()) {
            Some(condition) => NodeHealth::Unhealthy {
                condition: condition.clone(),
            },
            None => NodeHealth::Healthy,
        }
    }

    /// The node's role under the given configuration.
    #[must_use]
    pub fn role(&self, config: &EstimatorConfig) -> NodeRole {
        NodeRole::from_labels(&self.labels, config)
    }

    /// The first DNS label of the node name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// Everything known about a node at estimate time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node name used in reports.
    pub name: String,
    /// Node health.
    pub health: NodeHealth,
    /// Node role.
    pub role: NodeRole,
    /// Total node resources.
    pub capacity: NodeResources,
    /// Capacity minus system reservations.
    pub allocatable: NodeResources,
    /// Resources claimed by live workloads.
    pub consumption: NodeConsumption,
}

impl NodeSnapshot {
    /// Build a snapshot from a listed node and its aggregated consumption.
    #[must_use]
    pub fn new(node: &NodeInfo, config: &EstimatorConfig, consumption: NodeConsumption) -> Self {
        Self {
            name: node.short_name().to_string(),
            health: node.health(),
            role: node.role(config),
            capacity: node.capacity,
            allocatable: node.allocatable,
            consumption,
        }
    }
}

/// Trim a node name to its first DNS label.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
