//! Estimator configuration.
//!
//! Role labels and overcommit thresholds default to the values kapacity has
//! always used and can be overridden from the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Percentages above which a node is flagged as overcommitted.
///
/// CPU and memory use different defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvercommitThresholds {
    /// Limit for (limit ask + node memory limits) relative to memory capacity.
    #[serde(default = "OvercommitThresholds::default_combined_memory")]
    pub combined_memory_pct: u64,

    /// Limit for (limit ask + node CPU limits) relative to CPU capacity.
    #[serde(default = "OvercommitThresholds::default_combined_cpu")]
    pub combined_cpu_pct: u64,

    /// Limit for node CPU limits relative to allocatable CPU.
    #[serde(default = "OvercommitThresholds::default_node_cpu_limit")]
    pub node_cpu_limit_pct: u64,

    /// Limit for node memory limits relative to allocatable memory.
    #[serde(default = "OvercommitThresholds::default_node_memory_limit")]
    pub node_memory_limit_pct: u64,
}

impl OvercommitThresholds {
    const fn default_combined_memory() -> u64 {
        110
    }

    const fn default_combined_cpu() -> u64 {
        100
    }

    const fn default_node_cpu_limit() -> u64 {
        110
    }

    const fn default_node_memory_limit() -> u64 {
        100
    }
}

impl Default for OvercommitThresholds {
    fn default() -> Self {
        Self {
            combined_memory_pct: Self::default_combined_memory(),
            combined_cpu_pct: Self::default_combined_cpu(),
            node_cpu_limit_pct: Self::default_node_cpu_limit(),
            node_memory_limit_pct: Self::default_node_memory_limit(),
        }
    }
}

/// Configuration for a capacity estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Label that marks a worker node when set to `"true"`.
    #[serde(default = "EstimatorConfig::default_worker_role_label")]
    pub worker_role_label: String,

    /// Labels whose presence marks a control-plane node.
    #[serde(default = "EstimatorConfig::default_control_plane_role_labels")]
    pub control_plane_role_labels: Vec<String>,

    /// Overcommit thresholds.
    #[serde(default)]
    pub thresholds: OvercommitThresholds,
}

impl EstimatorConfig {
    fn default_worker_role_label() -> String {
        "node-role.kubernetes.io/node".to_string()
    }

    fn default_control_plane_role_labels() -> Vec<String> {
        vec![
            "node-role.kubernetes.io/master".to_string(),
            "node-role.kubernetes.io/control-plane".to_string(),
        ]
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `KAPACITY_WORKER_LABEL`: label that marks worker nodes
    /// - `KAPACITY_CONTROL_PLANE_LABELS`: comma-separated control-plane labels
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("KAPACITY_WORKER_LABEL") {
            let val = val.trim();
            if !val.is_empty() {
                config.worker_role_label = val.to_string();
            }
        }
        if let Some(val) = lookup("KAPACITY_CONTROL_PLANE_LABELS") {
            let labels: Vec<String> = val
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .collect();
            if !labels.is_empty() {
                config.control_plane_role_labels = labels;
            }
        }

        config
    }

    /// Check that the configuration can classify nodes.
    ///
    /// # Errors
    ///
    /// Returns [`EstimatorError::Config`](crate::EstimatorError::Config) if
    /// the worker label is empty or a control-plane label is blank.
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker_role_label.trim().is_empty() {
            return Err(crate::EstimatorError::Config(
                "worker role label must not be empty".to_string(),
            ));
        }
        if self
            .control_plane_role_labels
            .iter()
            .any(|label| label.trim().is_empty())
        {
            return Err(crate::EstimatorError::Config(
                "control-plane role labels must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            worker_role_label: Self::default_worker_role_label(),
            control_plane_role_labels: Self::default_control_plane_role_labels(),
            thresholds: OvercommitThresholds::default(),
        }
    }
}

/// Resolve the kubeconfig file to use.
///
/// An explicit path wins, then `KUBECONFIG`, then `$HOME/.kube/config`.
/// Returns `None` when nothing resolves, in which case the client falls back
/// to in-cluster configuration.
#[must_use]
pub fn resolve_kubeconfig(explicit: Option<PathBuf>) -> Option<PathBuf> {
    resolve_kubeconfig_with(explicit, |key| std::env::var(key).ok())
}

fn resolve_kubeconfig_with(
    explicit: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    if let Some(path) = lookup("KUBECONFIG").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    lookup("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".kube").join("config"))
}
