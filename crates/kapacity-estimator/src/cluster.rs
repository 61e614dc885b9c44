//! Cluster-wide aggregation.
//!
//! Walks every node in order, classifies the healthy workers and folds the
//! per-node outcomes into a single [`ClusterReport`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::aggregate_node_consumption;
use crate::classify::{classify, FeasibilityResult};
use crate::config::EstimatorConfig;
use crate::node::{NodeHealth, NodeInfo, NodeRole, NodeSnapshot};
use crate::source::ClusterSource;
use crate::types::{EstimateRequest, NodeConsumption};
use crate::Result;

/// What happened to one node during an estimate.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// A healthy worker that was classified.
    Worker(FeasibilityResult),
    /// A healthy control-plane node.
    ControlPlane(String),
    /// A healthy node with no recognized role.
    UnknownRole(String),
    /// A node failing a health condition.
    Unhealthy(String),
}

/// Cluster-wide outcome of a capacity estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    /// When the estimate was produced.
    pub generated_at: DateTime<Utc>,
    /// The request the estimate answers.
    pub request: EstimateRequest,
    /// Classified worker nodes in listing order.
    pub nodes: Vec<FeasibilityResult>,
    /// Total spinnable replicas over healthy workers.
    pub net_replicas: u64,
    /// Whether the requested replica count fits.
    pub schedulable: bool,
    /// Workers flagged for overcommit risk.
    pub overcommitted_nodes: Vec<String>,
    /// Nodes failing a health condition.
    pub unhealthy_nodes: Vec<String>,
    /// Healthy nodes with no recognized role.
    pub unknown_role_nodes: Vec<String>,
    /// Healthy control-plane nodes.
    pub control_plane_nodes: u64,
    /// Healthy worker nodes.
    pub worker_nodes: u64,
}

impl ClusterReport {
    /// Fold per-node outcomes into a report.
    #[must_use]
    pub fn from_outcomes(
        request: EstimateRequest,
        outcomes: impl IntoIterator<Item = NodeOutcome>,
    ) -> Self {
        let empty = Self {
            generated_at: Utc::now(),
            request,
            nodes: Vec::new(),
            net_replicas: 0,
            schedulable: false,
            overcommitted_nodes: Vec::new(),
            unhealthy_nodes: Vec::new(),
            unknown_role_nodes: Vec::new(),
            control_plane_nodes: 0,
            worker_nodes: 0,
        };

        let mut report = outcomes.into_iter().fold(empty, |mut report, outcome| {
            match outcome {
                NodeOutcome::Worker(result) => {
                    report.worker_nodes += 1;
                    report.net_replicas = report.net_replicas.saturating_add(result.spinnable);
                    if result.overcommit_risk {
                        report.overcommitted_nodes.push(result.node.clone());
                    }
                    report.nodes.push(result);
                }
                NodeOutcome::ControlPlane(_) => report.control_plane_nodes += 1,
                NodeOutcome::UnknownRole(name) => report.unknown_role_nodes.push(name),
                NodeOutcome::Unhealthy(name) => report.unhealthy_nodes.push(name),
            }
            report
        });

        report.schedulable = report.net_replicas >= request.replicas;
        report
    }
}

/// Runs capacity estimates against a cluster source.
pub struct ClusterEstimator<S> {
    source: S,
    config: EstimatorConfig,
}

impl<S: ClusterSource> ClusterEstimator<S> {
    /// Create an estimator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(source: S, config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    /// Get a reference to the estimator config.
    #[must_use]
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Get a reference to the cluster source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Estimate whether the cluster can host `request.replicas` more replicas.
    ///
    /// Nodes and namespaces are processed sequentially in listing order.
    ///
    /// # Errors
    ///
    /// Returns the first listing or conversion error; no partial report is
    /// produced.
    pub async fn estimate(&self, request: &EstimateRequest) -> Result<ClusterReport> {
        let namespaces = self.source.list_namespaces().await?;
        let nodes = self.source.list_nodes().await?;

        info!(
            namespaces = namespaces.len(),
            nodes = nodes.len(),
            replicas = request.replicas,
            "Estimating cluster capacity"
        );

        let mut outcomes = Vec::with_capacity(nodes.len());
        for node in &nodes {
            outcomes.push(self.evaluate_node(node, &namespaces, request).await?);
        }

        let report = ClusterReport::from_outcomes(*request, outcomes);

        info!(
            net_replicas = report.net_replicas,
            schedulable = report.schedulable,
            workers = report.worker_nodes,
            unhealthy = report.unhealthy_nodes.len(),
            overcommitted = report.overcommitted_nodes.len(),
            "Capacity estimate complete"
        );

        Ok(report)
    }

    async fn evaluate_node(
        &self,
        node: &NodeInfo,
        namespaces: &[String],
        request: &EstimateRequest,
    ) -> Result<NodeOutcome> {
        let name = node.short_name().to_string();

        if let NodeHealth::Unhealthy { condition } = node.health() {
            warn!(
                node = %node.name,
                condition = %condition.kind,
                status = %condition.status,
                "Node is unhealthy, excluding from capacity"
            );
            return Ok(NodeOutcome::Unhealthy(name));
        }

        match node.role(&self.config) {
            NodeRole::Worker => {}
            NodeRole::ControlPlane => {
                debug!(node = %node.name, "Skipping control-plane node");
                return Ok(NodeOutcome::ControlPlane(name));
            }
            NodeRole::Unknown => {
                debug!(node = %node.name, "Skipping node without a role label");
                return Ok(NodeOutcome::UnknownRole(name));
            }
        }

        let consumption: NodeConsumption =
            aggregate_node_consumption(&self.source, &node.name, namespaces).await?;
        let snapshot = NodeSnapshot::new(node, &self.config, consumption);
        let result = classify(
            &snapshot,
            &request.request,
            &request.limit,
            &self.config.thresholds,
        );

        debug!(
            node = %node.name,
            live_workloads = result.live_workloads,
            remaining_cpu = result.remaining_cpu,
            remaining_memory = result.remaining_memory,
            spinnable = result.spinnable,
            cpu_crunch = result.cpu_crunch,
            memory_crunch = result.memory_crunch,
            "Classified worker node"
        );
        if result.overcommit_risk {
            warn!(node = %node.name, "Node limits risk overcommitment");
        }

        Ok(NodeOutcome::Worker(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Utilization;
    use crate::node::{NodeCondition, NodeResources};
    use crate::source::mock::MockClusterSource;
    use crate::types::{ContainerResources, ResourceAsk, Workload, WorkloadPhase};
    use crate::EstimatorError;
    use kapacity_core::GIGABYTE;
    use std::collections::BTreeMap;

    const WORKER: &str = "node-role.kubernetes.io/node";
    const MASTER: &str = "node-role.kubernetes.io/master";

    fn request(replicas: u64) -> EstimateRequest {
        EstimateRequest {
            request: ResourceAsk::new(500, GIGABYTE),
            limit: ResourceAsk::new(500, GIGABYTE),
            replicas,
        }
    }

    fn result(node: &str, spinnable: u64) -> FeasibilityResult {
        FeasibilityResult {
            node: node.to_string(),
            utilization: Utilization::default(),
            live_workloads: 0,
            remaining_cpu: 0,
            remaining_memory: 0,
            spinnable,
            cpu_crunch: false,
            memory_crunch: false,
            overcommit_risk: false,
        }
    }

    fn node(name: &str, role_label: &str, ready: &str) -> NodeInfo {
        let resources = NodeResources {
            cpu_millicores: 4000,
            memory_bytes: 16 * GIGABYTE,
            pods: 110,
        };
        NodeInfo {
            name: name.to_string(),
            labels: BTreeMap::from([(role_label.to_string(), "true".to_string())]),
            conditions: vec![
                NodeCondition::new("MemoryPressure", "False"),
                NodeCondition::new("Ready", ready),
            ],
            capacity: resources,
            allocatable: resources,
        }
    }

    fn running(name: &str, node: &str, cpu: u64, memory: u64) -> Workload {
        Workload {
            name: name.to_string(),
            namespace: "default".to_string(),
            node_name: Some(node.to_string()),
            phase: WorkloadPhase::Running,
            containers: vec![ContainerResources {
                cpu_request: cpu,
                cpu_limit: cpu,
                memory_request: memory,
                memory_limit: memory,
            }],
        }
    }

    #[test]
    fn schedulable_when_net_replicas_cover_request() {
        let outcomes = || {
            vec![
                NodeOutcome::Worker(result("a", 3)),
                NodeOutcome::Worker(result("b", 2)),
            ]
        };

        let report = ClusterReport::from_outcomes(request(5), outcomes());
        assert_eq!(report.net_replicas, 5);
        assert!(report.schedulable);

        let report = ClusterReport::from_outcomes(request(6), outcomes());
        assert!(!report.schedulable);
    }

    #[test]
    fn report_counts_roles_and_lists() {
        let mut hot = result("hot", 1);
        hot.overcommit_risk = true;

        let report = ClusterReport::from_outcomes(
            request(1),
            vec![
                NodeOutcome::ControlPlane("cp".to_string()),
                NodeOutcome::Worker(hot),
                NodeOutcome::Unhealthy("sick".to_string()),
                NodeOutcome::UnknownRole("plain".to_string()),
                NodeOutcome::Worker(result("cool", 0)),
            ],
        );

        assert_eq!(report.control_plane_nodes, 1);
        assert_eq!(report.worker_nodes, 2);
        assert_eq!(report.overcommitted_nodes, vec!["hot"]);
        assert_eq!(report.unhealthy_nodes, vec!["sick"]);
        assert_eq!(report.unknown_role_nodes, vec!["plain"]);
        assert_eq!(report.nodes.len(), 2);
        assert_eq!(report.net_replicas, 1);
        assert!(report.schedulable);
    }

    #[test]
    fn empty_cluster_is_not_schedulable() {
        let report = ClusterReport::from_outcomes(request(1), Vec::new());
        assert_eq!(report.net_replicas, 0);
        assert!(!report.schedulable);

        let report = ClusterReport::from_outcomes(request(0), Vec::new());
        assert!(report.schedulable);
    }

    #[tokio::test]
    async fn estimate_end_to_end() {
        let source = MockClusterSource::new()
            .with_namespace("kube-system")
            .with_node(node("master-1.example.com", MASTER, "True"))
            .with_node(node("worker-1.example.com", WORKER, "True"))
            .with_node(node("worker-2.example.com", WORKER, "True"))
            .with_node(node("worker-3.example.com", WORKER, "False"))
            .with_workload(running("api", "worker-1.example.com", 3000, 4 * GIGABYTE))
            .with_workload(running("db", "worker-2.example.com", 1000, 14 * GIGABYTE));

        let estimator = ClusterEstimator::new(source, EstimatorConfig::default()).unwrap();
        let report = estimator.estimate(&request(3)).await.unwrap();

        assert_eq!(report.control_plane_nodes, 1);
        assert_eq!(report.worker_nodes, 2);
        assert_eq!(report.unhealthy_nodes, vec!["worker-3"]);

        // worker-1: 1000m left -> 2 replicas; worker-2: 2Gi left -> 2 replicas
        let spinnable: Vec<(&str, u64)> = report
            .nodes
            .iter()
            .map(|r| (r.node.as_str(), r.spinnable))
            .collect();
        assert_eq!(spinnable, vec![("worker-1", 2), ("worker-2", 2)]);
        assert_eq!(report.net_replicas, 4);
        assert!(report.schedulable);

        // unhealthy and control-plane nodes are never queried for workloads
        assert_eq!(estimator.source().workload_list_calls(), 4);
    }

    #[tokio::test]
    async fn unhealthy_nodes_skip_overcommit_check() {
        let mut sick = node("sick", WORKER, "False");
        sick.capacity.cpu_millicores = 1;

        let source = MockClusterSource::new().with_node(sick);
        let estimator = ClusterEstimator::new(source, EstimatorConfig::default()).unwrap();
        let report = estimator.estimate(&request(1)).await.unwrap();

        assert!(report.overcommitted_nodes.is_empty());
        assert_eq!(report.unhealthy_nodes, vec!["sick"]);
        assert_eq!(report.net_replicas, 0);
    }

    #[tokio::test]
    async fn workload_listing_failure_aborts() {
        let source = MockClusterSource::new()
            .with_node(node("worker-1", WORKER, "True"))
            .failing_namespace("default");

        let estimator = ClusterEstimator::new(source, EstimatorConfig::default()).unwrap();
        let err = estimator.estimate(&request(1)).await.unwrap_err();
        assert!(matches!(err, EstimatorError::Enumeration { .. }));
    }

    #[tokio::test]
    async fn node_listing_failure_aborts() {
        let source = MockClusterSource::new().failing_nodes();
        let estimator = ClusterEstimator::new(source, EstimatorConfig::default()).unwrap();
        assert!(estimator.estimate(&request(1)).await.is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EstimatorConfig {
            worker_role_label: String::new(),
            ..EstimatorConfig::default()
        };
        assert!(matches!(
            ClusterEstimator::new(MockClusterSource::new(), config),
            Err(EstimatorError::Config(_))
        ));
    }
}
