//! Cluster data sources.
//!
//! The estimator reads the cluster through the [`ClusterSource`] trait. The
//! [`K8sClusterSource`] implementation talks to a Kubernetes API server; the
//! `mock` module provides an in-memory source for tests.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::debug;

use kapacity_core::QuantityError;
use kube_quantity::ParsedQuantity;

use crate::node::{NodeCondition, NodeInfo, NodeResources};
use crate::types::{ContainerResources, Workload, WorkloadPhase};
use crate::{EstimatorError, Result};

/// Read access to the cluster state an estimate needs.
///
/// Implementations must fail the whole call rather than return partial
/// listings.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// List the names of all namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespaces cannot be listed.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// List all nodes with their labels, conditions and resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the nodes cannot be listed or converted.
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;

    /// List the workloads in `namespace` bound to `node_name` that may be live.
    ///
    /// Sources should leave out pending, terminal and unknown workloads where
    /// they can; callers filter again.
    ///
    /// # Errors
    ///
    /// Returns an error if the workloads cannot be listed or converted.
    async fn list_active_workloads(
        &self,
        namespace: &str,
        node_name: &str,
    ) -> Result<Vec<Workload>>;
}

/// Field selector matching pods bound to a node that are neither pending,
/// finished nor unknown.
#[must_use]
pub fn active_pod_selector(node_name: &str) -> String {
    format!(
        "spec.nodeName={node_name},status.phase!=Pending,status.phase!=Succeeded,\
         status.phase!=Failed,status.phase!=Unknown"
    )
}

/// Cluster source backed by the Kubernetes API.
pub struct K8sClusterSource {
    client: Client,
}

impl K8sClusterSource {
    /// Connect using the default client configuration.
    ///
    /// This uses in-cluster configuration or the default kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes client cannot be created.
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(client))
    }

    /// Connect using the kubeconfig file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the client
    /// cannot be created from it.
    pub async fn from_kubeconfig(path: &Path) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path)?;
        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await?;
        let client = Client::try_from(config)?;
        Ok(Self::with_client(client))
    }

    /// Create a source with a pre-configured client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterSource for K8sClusterSource {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| EstimatorError::enumeration("namespaces", e))?;

        let names: Vec<String> = list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect();

        debug!(count = names.len(), "Listed namespaces");
        Ok(names)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| EstimatorError::enumeration("nodes", e))?;

        debug!(count = list.items.len(), "Listed nodes");
        list.items.iter().map(node_info_from_k8s).collect()
    }

    async fn list_active_workloads(
        &self,
        namespace: &str,
        node_name: &str,
    ) -> Result<Vec<Workload>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&active_pod_selector(node_name));
        let list = api.list(&params).await.map_err(|e| {
            EstimatorError::enumeration(format!("pods in namespace {namespace}"), e)
        })?;

        list.items.iter().map(workload_from_k8s).collect()
    }
}

/// Convert a Kubernetes node into a [`NodeInfo`].
///
/// Missing resource entries count as zero.
///
/// # Errors
///
/// Returns an error if the node has no name or reports a malformed quantity.
pub fn node_info_from_k8s(node: &Node) -> Result<NodeInfo> {
    let name = node
        .metadata
        .name
        .clone()
        .ok_or_else(|| EstimatorError::MissingField("node metadata.name".to_string()))?;

    let labels = node.metadata.labels.clone().unwrap_or_default();
    let status = node.status.as_ref();

    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| NodeCondition::new(c.type_.clone(), c.status.clone()))
                .collect()
        })
        .unwrap_or_default();

    Ok(NodeInfo {
        name,
        labels,
        conditions,
        capacity: node_resources(status.and_then(|s| s.capacity.as_ref()))?,
        allocatable: node_resources(status.and_then(|s| s.allocatable.as_ref()))?,
    })
}

fn node_resources(resources: Option<&BTreeMap<String, Quantity>>) -> Result<NodeResources> {
    Ok(NodeResources {
        cpu_millicores: milli(resources, "cpu")?,
        memory_bytes: whole(resources, "memory")?,
        pods: whole(resources, "pods")?,
    })
}

/// Convert a Kubernetes pod into a [`Workload`].
///
/// Undeclared requests and limits count as zero.
///
/// # Errors
///
/// Returns an error if a container declares a malformed quantity.
pub fn workload_from_k8s(pod: &Pod) -> Result<Workload> {
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(WorkloadPhase::from_k8s_phase)
        .unwrap_or_default();

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|container| {
            let resources = container.resources.as_ref();
            let requests = resources.and_then(|r| r.requests.as_ref());
            let limits = resources.and_then(|r| r.limits.as_ref());
            Ok(ContainerResources {
                cpu_request: milli(requests, "cpu")?,
                cpu_limit: milli(limits, "cpu")?,
                memory_request: whole(requests, "memory")?,
                memory_limit: whole(limits, "memory")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Workload {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        phase,
        containers,
    })
}

fn milli(map: Option<&BTreeMap<String, Quantity>>, key: &str) -> Result<u64> {
    match map.and_then(|m| m.get(key)) {
        Some(quantity) => Ok(scaled_units(quantity, 1000.0)?),
        None => Ok(0),
    }
}

fn whole(map: Option<&BTreeMap<String, Quantity>>, key: &str) -> Result<u64> {
    match map.and_then(|m| m.get(key)) {
        Some(quantity) => Ok(scaled_units(quantity, 1.0)?),
        None => Ok(0),
    }
}

/// Relative slack under which a scaled value counts as already whole.
const WHOLE_TOLERANCE: f64 = 1e-9;

/// Convert an API quantity to `scale` units per base unit, rounding up.
///
/// Values within [`WHOLE_TOLERANCE`] of a whole number snap to it so that
/// `"3800m"` reads as 3800 millicores rather than 3801.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn scaled_units(quantity: &Quantity, scale: f64) -> std::result::Result<u64, QuantityError> {
    let raw = || quantity.0.clone();

    let parsed = ParsedQuantity::try_from(quantity)
        .map_err(|_| QuantityError::InvalidKubeQuantity(raw()))?;
    let base = parsed
        .to_bytes_f64()
        .ok_or_else(|| QuantityError::Overflow(raw()))?;
    if base < 0.0 {
        return Err(QuantityError::NegativeKubeQuantity(raw()));
    }

    let scaled = base * scale;
    let nearest = scaled.round();
    let units = if (scaled - nearest).abs() <= WHOLE_TOLERANCE * nearest.max(1.0) {
        nearest
    } else {
        scaled.ceil()
    };

    if !units.is_finite() || units >= u64::MAX as f64 {
        return Err(QuantityError::Overflow(raw()));
    }
    Ok(units as u64)
}

/// An in-memory cluster source for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// A cluster source that serves namespaces, nodes and workloads from memory.
    ///
    /// Workloads are returned whatever their phase so that callers' own
    /// filtering is exercised.
    #[derive(Default)]
    pub struct MockClusterSource {
        namespaces: Vec<String>,
        nodes: Vec<NodeInfo>,
        workloads: Vec<Workload>,
        failing_namespaces: HashSet<String>,
        fail_nodes: bool,
        workload_list_calls: Mutex<usize>,
    }

    impl MockClusterSource {
        /// Create an empty mock source.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a namespace.
        #[must_use]
        pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
            let namespace = namespace.into();
            if !self.namespaces.contains(&namespace) {
                self.namespaces.push(namespace);
            }
            self
        }

        /// Add a node.
        #[must_use]
        pub fn with_node(mut self, node: NodeInfo) -> Self {
            self.nodes.push(node);
            self
        }

        /// Add a workload, registering its namespace.
        #[must_use]
        pub fn with_workload(self, workload: Workload) -> Self {
            let mut source = self.with_namespace(workload.namespace.clone());
            source.workloads.push(workload);
            source
        }

        /// Make listing workloads in `namespace` fail.
        #[must_use]
        pub fn failing_namespace(self, namespace: impl Into<String>) -> Self {
            let namespace = namespace.into();
            let mut source = self.with_namespace(namespace.clone());
            source.failing_namespaces.insert(namespace);
            source
        }

        /// Make listing nodes fail.
        #[must_use]
        pub fn failing_nodes(mut self) -> Self {
            self.fail_nodes = true;
            self
        }

        /// Number of workload listings served so far.
        #[must_use]
        pub fn workload_list_calls(&self) -> usize {
            *self.workload_list_calls.lock()
        }
    }

    #[async_trait]
    impl ClusterSource for MockClusterSource {
        async fn list_namespaces(&self) -> Result<Vec<String>> {
            Ok(self.namespaces.clone())
        }

        async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
            if self.fail_nodes {
                return Err(EstimatorError::enumeration("nodes", "mock node listing failure"));
            }
            Ok(self.nodes.clone())
        }

        async fn list_active_workloads(
            &self,
            namespace: &str,
            node_name: &str,
        ) -> Result<Vec<Workload>> {
            *self.workload_list_calls.lock() += 1;

            if self.failing_namespaces.contains(namespace) {
                return Err(EstimatorError::enumeration(
                    format!("pods in namespace {namespace}"),
                    "mock workload listing failure",
                ));
            }

            Ok(self
                .workloads
                .iter()
                .filter(|w| w.namespace == namespace)
                .filter(|w| w.node_name.as_deref() == Some(node_name))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, NodeCondition as K8sNodeCondition, NodeStatus, PodSpec, PodStatus,
        ResourceRequirements,
    };
    use kube::api::ObjectMeta;
    use std::io::Write;

    fn quantities(pairs: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Quantity((*v).to_string())))
            .collect()
    }

    fn k8s_node() -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("ip-10-0-0-1.ec2.internal".to_string()),
                labels: Some(BTreeMap::from([(
                    "node-role.kubernetes.io/node".to_string(),
                    "true".to_string(),
                )])),
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![
                    K8sNodeCondition {
                        type_: "MemoryPressure".to_string(),
                        status: "False".to_string(),
                        ..Default::default()
                    },
                    K8sNodeCondition {
                        type_: "Ready".to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                ]),
                capacity: Some(quantities(&[
                    ("cpu", "4"),
                    ("memory", "16374584Ki"),
                    ("pods", "110"),
                ])),
                allocatable: Some(quantities(&[
                    ("cpu", "3800m"),
                    ("memory", "15223608Ki"),
                    ("pods", "110"),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn k8s_pod(resources: Option<ResourceRequirements>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some("node-1".to_string()),
                containers: vec![Container {
                    name: "web".to_string(),
                    resources,
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn selector_excludes_inactive_phases() {
        assert_eq!(
            active_pod_selector("node-1"),
            "spec.nodeName=node-1,status.phase!=Pending,status.phase!=Succeeded,\
             status.phase!=Failed,status.phase!=Unknown"
        );
    }

    #[test]
    fn converts_node() {
        let info = node_info_from_k8s(&k8s_node()).unwrap();

        assert_eq!(info.name, "ip-10-0-0-1.ec2.internal");
        assert_eq!(info.short_name(), "ip-10-0-0-1");
        assert_eq!(info.conditions.len(), 2);
        assert!(info.health().is_healthy());
        assert_eq!(
            info.capacity,
            NodeResources {
                cpu_millicores: 4000,
                memory_bytes: 16_374_584 * 1024,
                pods: 110,
            }
        );
        assert_eq!(info.allocatable.cpu_millicores, 3800);
        assert_eq!(info.allocatable.memory_bytes, 15_223_608 * 1024);
    }

    #[test]
    fn node_without_status_has_no_resources() {
        let mut node = k8s_node();
        node.status = None;
        let info = node_info_from_k8s(&node).unwrap();
        assert_eq!(info.capacity, NodeResources::default());
        assert!(info.conditions.is_empty());
    }

    #[test]
    fn node_without_name_is_an_error() {
        let mut node = k8s_node();
        node.metadata.name = None;
        assert!(matches!(
            node_info_from_k8s(&node),
            Err(EstimatorError::MissingField(_))
        ));
    }

    #[test]
    fn malformed_node_quantity_is_an_error() {
        let mut node = k8s_node();
        if let Some(status) = node.status.as_mut() {
            status.capacity = Some(quantities(&[("cpu", "four")]));
        }
        assert!(matches!(
            node_info_from_k8s(&node),
            Err(EstimatorError::Quantity(_))
        ));
    }

    fn milli_of(raw: &str) -> Result<u64> {
        milli(Some(&quantities(&[("cpu", raw)])), "cpu")
    }

    fn whole_of(raw: &str) -> Result<u64> {
        whole(Some(&quantities(&[("memory", raw)])), "memory")
    }

    #[test]
    fn quantity_milli_values() {
        assert_eq!(milli_of("3800m").unwrap(), 3800);
        assert_eq!(milli_of("0.5").unwrap(), 500);
        assert_eq!(milli_of("1.25").unwrap(), 1250);
        assert_eq!(milli_of("250000000n").unwrap(), 250);
        assert_eq!(milli_of("4").unwrap(), 4000);
        assert_eq!(milli_of("0").unwrap(), 0);
    }

    #[test]
    fn quantity_rounds_up_to_whole_units() {
        assert_eq!(milli_of("1n").unwrap(), 1);
        assert_eq!(milli_of("1500u").unwrap(), 2);
        assert_eq!(whole_of("0.5").unwrap(), 1);
        assert_eq!(whole_of("1m").unwrap(), 1);
    }

    #[test]
    fn quantity_whole_values() {
        assert_eq!(whole_of("16374584Ki").unwrap(), 16_374_584 * 1024);
        assert_eq!(whole_of("1Gi").unwrap(), 1 << 30);
        assert_eq!(whole_of("2G").unwrap(), 2_000_000_000);
        assert_eq!(whole_of("110").unwrap(), 110);
        assert_eq!(whole_of("0Gi").unwrap(), 0);
    }

    #[test]
    fn missing_quantity_is_zero() {
        assert_eq!(milli(None, "cpu").unwrap(), 0);
        assert_eq!(whole(Some(&quantities(&[("cpu", "1")])), "memory").unwrap(), 0);
    }

    #[test]
    fn negative_quantity_is_an_error() {
        assert!(matches!(
            whole_of("-1Gi"),
            Err(EstimatorError::Quantity(
                QuantityError::NegativeKubeQuantity(_) | QuantityError::InvalidKubeQuantity(_)
            ))
        ));
        assert!(milli_of("-250m").is_err());
    }

    #[test]
    fn oversized_quantity_is_an_error() {
        assert!(matches!(
            whole_of("100E"),
            Err(EstimatorError::Quantity(QuantityError::Overflow(_)))
        ));
        assert!(milli_of("20E").is_err());
    }

    #[test]
    fn malformed_quantity_is_an_error() {
        assert!(matches!(
            whole_of("abc"),
            Err(EstimatorError::Quantity(QuantityError::InvalidKubeQuantity(_)))
        ));
    }

    #[test]
    fn converts_pod() {
        let pod = k8s_pod(Some(ResourceRequirements {
            requests: Some(quantities(&[("cpu", "250m"), ("memory", "64Mi")])),
            limits: Some(quantities(&[("cpu", "1"), ("memory", "128Mi")])),
            ..Default::default()
        }));

        let workload = workload_from_k8s(&pod).unwrap();
        assert_eq!(workload.name, "web-0");
        assert_eq!(workload.namespace, "default");
        assert_eq!(workload.node_name.as_deref(), Some("node-1"));
        assert_eq!(workload.phase, WorkloadPhase::Running);
        assert_eq!(
            workload.containers,
            vec![ContainerResources {
                cpu_request: 250,
                cpu_limit: 1000,
                memory_request: 64 << 20,
                memory_limit: 128 << 20,
            }]
        );
    }

    #[test]
    fn undeclared_resources_are_zero() {
        let workload = workload_from_k8s(&k8s_pod(None)).unwrap();
        assert_eq!(workload.containers, vec![ContainerResources::default()]);

        let requests_only = k8s_pod(Some(ResourceRequirements {
            requests: Some(quantities(&[("cpu", "100m")])),
            ..Default::default()
        }));
        let workload = workload_from_k8s(&requests_only).unwrap();
        assert_eq!(workload.containers[0].cpu_request, 100);
        assert_eq!(workload.containers[0].cpu_limit, 0);
        assert_eq!(workload.containers[0].memory_limit, 0);
    }

    #[test]
    fn pod_without_phase_is_unknown() {
        let mut pod = k8s_pod(None);
        pod.status = None;
        assert_eq!(workload_from_k8s(&pod).unwrap().phase, WorkloadPhase::Unknown);
    }

    #[tokio::test]
    async fn unreadable_kubeconfig_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "clusters: [not valid").unwrap();

        let result = K8sClusterSource::from_kubeconfig(file.path()).await;
        assert!(matches!(result, Err(EstimatorError::Kubeconfig(_))));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config");
        let result = K8sClusterSource::from_kubeconfig(&missing).await;
        assert!(matches!(result, Err(EstimatorError::Kubeconfig(_))));
    }

    #[tokio::test]
    async fn mock_serves_only_matching_workloads() {
        let workload = workload_from_k8s(&k8s_pod(None)).unwrap();
        let source = mock::MockClusterSource::new().with_workload(workload);

        assert_eq!(source.list_namespaces().await.unwrap(), vec!["default"]);
        assert_eq!(
            source
                .list_active_workloads("default", "node-1")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(source
            .list_active_workloads("default", "node-2")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(source.workload_list_calls(), 2);
    }
}
