//! Aggregation of the resources live workloads hold on a node.

use futures::{stream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::source::ClusterSource;
use crate::types::{NodeConsumption, Workload};
use crate::{EstimatorError, Result};

/// Sum the requests, limits and live workload count on `node_name`.
///
/// Namespaces are visited one after another in the order given. Only live
/// workloads count, and each counts once however many containers it has.
///
/// # Errors
///
/// Returns the first listing error; no partial sum is returned.
pub async fn aggregate_node_consumption<S>(
    source: &S,
    node_name: &str,
    namespaces: &[String],
) -> Result<NodeConsumption>
where
    S: ClusterSource + ?Sized,
{
    stream::iter(namespaces)
        .map(Ok::<_, EstimatorError>)
        .try_fold(NodeConsumption::default(), |total, namespace| async move {
            let workloads = source.list_active_workloads(namespace, node_name).await?;
            let consumption = sum_live(&workloads);

            if consumption.live_workloads > 0 {
                debug!(
                    node = node_name,
                    namespace = %namespace,
                    workloads = consumption.live_workloads,
                    cpu_requested = consumption.cpu_requested,
                    memory_requested = consumption.memory_requested,
                    "Aggregated namespace consumption"
                );
            }

            Ok(total + consumption)
        })
        .await
}

/// Sum the consumption of the live workloads in `workloads`.
#[must_use]
pub fn sum_live(workloads: &[Workload]) -> NodeConsumption {
    workloads
        .iter()
        .filter(|w| w.phase.is_live())
        .map(NodeConsumption::of_workload)
        .fold(NodeConsumption::default(), |total, c| total + c)
}
