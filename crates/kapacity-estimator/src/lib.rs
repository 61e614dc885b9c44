//! Replica capacity estimation for Kubernetes clusters.
//!
//! This crate answers one question: can the cluster host N more replicas of a
//! workload with a given CPU/memory request and limit? It handles:
//!
//! - Node discovery with health and role classification
//! - Per-node aggregation of live workload requests and limits
//! - Per-node replica feasibility and overcommit risk
//! - A cluster-wide verdict over all healthy worker nodes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         kapacity CLI                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ClusterEstimator                            │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────────┐   │
//! │  │  Health &   │ │  Workload   │ │    Feasibility &        │   │
//! │  │  Role       │ │  Aggregate  │ │    Overcommit           │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────────┘   │
//! │                         │                                       │
//! │                         ▼                                       │
//! │                  ┌─────────────┐                                │
//! │                  │ClusterSource│                                │
//! │                  └─────────────┘                                │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Kubernetes API Server                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use kapacity_estimator::{
//!     ClusterEstimator, EstimateRequest, EstimatorConfig, K8sClusterSource, ResourceAsk,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = K8sClusterSource::new().await?;
//! let estimator = ClusterEstimator::new(source, EstimatorConfig::from_env())?;
//!
//! let request = EstimateRequest {
//!     request: ResourceAsk::parse("500m", "1G")?,
//!     limit: ResourceAsk::parse("1", "2G")?,
//!     replicas: 3,
//! };
//!
//! let report = estimator.estimate(&request).await?;
//! println!("{} replicas fit, schedulable: {}", report.net_replicas, report.schedulable);
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! For testing without a real Kubernetes cluster, enable the `test-utils` feature
//! and use the mock source:
//!
//! ```ignore
//! use kapacity_estimator::{ClusterEstimator, EstimatorConfig, MockClusterSource};
//!
//! let source = MockClusterSource::new().with_namespace("default");
//! let estimator = ClusterEstimator::new(source, EstimatorConfig::default())?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aggregate;
pub mod classify;
pub mod cluster;
pub mod config;
pub mod error;
pub mod feasibility;
pub mod node;
pub mod source;
pub mod types;

pub use aggregate::{aggregate_node_consumption, sum_live};
pub use classify::{classify, is_overcommitted, FeasibilityResult, Utilization};
pub use cluster::{ClusterEstimator, ClusterReport, NodeOutcome};
pub use config::{resolve_kubeconfig, EstimatorConfig, OvercommitThresholds};
pub use error::{EstimatorError, Result};
pub use feasibility::{estimate, Estimate};
pub use node::{
    short_name, NodeCondition, NodeHealth, NodeInfo, NodeResources, NodeRole, NodeSnapshot,
};
pub use source::{active_pod_selector, ClusterSource, K8sClusterSource};
pub use types::{
    ContainerResources, EstimateRequest, NodeConsumption, ResourceAsk, Workload, WorkloadPhase,
};

#[cfg(any(test, feature = "test-utils"))]
pub use source::mock::MockClusterSource;
