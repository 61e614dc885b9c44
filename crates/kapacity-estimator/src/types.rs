//! Types for the estimator crate.

use std::ops::{Add, AddAssign};

use kapacity_core::{parse_cpu, parse_memory};
use serde::{Deserialize, Serialize};

/// The CPU and memory footprint of a single replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceAsk {
    /// CPU in millicores.
    pub cpu_millicores: u64,
    /// Memory in bytes.
    pub memory_bytes: u64,
}

impl ResourceAsk {
    /// Create an ask from canonical units.
    #[must_use]
    pub const fn new(cpu_millicores: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
        }
    }

    /// Parse an ask from user-supplied CPU and memory strings.
    ///
    /// The memory string never fails to parse; unreadable input becomes zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the CPU string is not a valid CPU quantity.
    pub fn parse(cpu: &str, memory: &str) -> crate::Result<Self> {
        Ok(Self {
            cpu_millicores: parse_cpu(cpu)?,
            memory_bytes: parse_memory(memory),
        })
    }
}

/// What the caller wants to know the cluster can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateRequest {
    /// Per-replica resource requests.
    pub request: ResourceAsk,
    /// Per-replica resource limits.
    pub limit: ResourceAsk,
    /// Number of replicas the caller wants to run.
    pub replicas: u64,
}

/// Phase of a workload's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadPhase {
    /// Accepted but not yet running.
    Pending,
    /// Bound to a node with at least one container running.
    Running,
    /// All containers terminated successfully.
    Succeeded,
    /// At least one container failed.
    Failed,
    /// Phase cannot be determined.
    #[default]
    Unknown,
}

impl WorkloadPhase {
    /// Parse a phase from a Kubernetes pod phase string.
    #[must_use]
    pub fn from_k8s_phase(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Check if the workload is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Check if the workload currently holds node resources.
    ///
    /// Pending, terminal and unknown workloads are not counted.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Declared requests and limits of one container.
///
/// An undeclared value is zero, not unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainerResources {
    /// CPU request in millicores.
    pub cpu_request: u64,
    /// CPU limit in millicores.
    pub cpu_limit: u64,
    /// Memory request in bytes.
    pub memory_request: u64,
    /// Memory limit in bytes.
    pub memory_limit: u64,
}

/// A workload instance (pod) scheduled to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Workload name.
    pub name: String,
    /// Namespace the workload lives in.
    pub namespace: String,
    /// Node the workload is bound to.
    pub node_name: Option<String>,
    /// Current lifecycle phase.
    pub phase: WorkloadPhase,
    /// Resources declared by each container.
    pub containers: Vec<ContainerResources>,
}

/// Resources currently claimed on a node by live workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeConsumption {
    /// Sum of CPU requests in millicores.
    pub cpu_requested: u64,
    /// Sum of CPU limits in millicores.
    pub cpu_limit: u64,
    /// Sum of memory requests in bytes.
    pub memory_requested: u64,
    /// Sum of memory limits in bytes.
    pub memory_limit: u64,
    /// Number of live workloads.
    pub live_workloads: u64,
}

impl NodeConsumption {
    /// Consumption of a single workload: its containers summed, counted once.
    #[must_use]
    pub fn of_workload(workload: &Workload) -> Self {
        workload.containers.iter().fold(
            Self {
                live_workloads: 1,
                ..Self::default()
            },
            |acc, container| Self {
                cpu_requested: acc.cpu_requested.saturating_add(container.cpu_request),
                cpu_limit: acc.cpu_limit.saturating_add(container.cpu_limit),
                memory_requested: acc.memory_requested.saturating_add(container.memory_request),
                memory_limit: acc.memory_limit.saturating_add(container.memory_limit),
                ..acc
            },
        )
    }
}

impl Add for NodeConsumption {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            cpu_requested: self.cpu_requested.saturating_add(rhs.cpu_requested),
            cpu_limit: self.cpu_limit.saturating_add(rhs.cpu_limit),
            memory_requested: self.memory_requested.saturating_add(rhs.memory_requested),
            memory_limit: self.memory_limit.saturating_add(rhs.memory_limit),
            live_workloads: self.live_workloads.saturating_add(rhs.live_workloads),
        }
    }
}

impl AddAssign for NodeConsumption {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
