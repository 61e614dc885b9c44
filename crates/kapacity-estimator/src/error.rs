//! Error types for the estimator crate.

use thiserror::Error;

/// A boxed error from a cluster data source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while estimating cluster capacity.
///
/// Every variant aborts the run; the estimator never returns a partial report.
#[derive(Error, Debug)]
pub enum EstimatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// The kubeconfig file could not be loaded.
    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// A resource quantity could not be parsed.
    #[error("Invalid quantity: {0}")]
    Quantity(#[from] kapacity_core::QuantityError),

    /// An API object is missing a field the estimate depends on.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Listing objects from the cluster data source failed.
    #[error("Failed to list {resource}")]
    Enumeration {
        /// What was being listed.
        resource: String,
        /// Why the listing failed.
        #[source]
        source: BoxError,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EstimatorError {
    /// Wrap a listing failure.
    pub fn enumeration(resource: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Enumeration {
            resource: resource.into(),
            source: source.into(),
        }
    }

    /// Check if this error came from talking to the cluster.
    #[must_use]
    pub fn is_cluster_error(&self) -> bool {
        matches!(
            self,
            Self::KubeApi(_) | Self::Kubeconfig(_) | Self::Enumeration { .. }
        )
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Quantity(_) | Self::Config(_) => 2,
            Self::KubeApi(_)
            | Self::Kubeconfig(_)
            | Self::Enumeration { .. }
            | Self::MissingField(_) => 1,
        }
    }
}

/// A specialized Result type for estimator operations.
pub type Result<T> = std::result::Result<T, EstimatorError>;
