//! Error types for quantity parsing.

use thiserror::Error;

/// A result type using `QuantityError`.
pub type Result<T> = std::result::Result<T, QuantityError>;

/// Errors that can occur while parsing a resource quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// The CPU string has no numeric leading segment.
    #[error("invalid cpu quantity: {0:?}")]
    InvalidCpu(String),

    /// The CPU string parsed to zero millicores.
    #[error("cpu quantity must be greater than zero: {0:?}")]
    ZeroCpu(String),

    /// The value does not fit in the canonical unit.
    #[error("quantity out of range: {0:?}")]
    Overflow(String),

    /// A Kubernetes API quantity string could not be parsed.
    #[error("invalid kubernetes quantity: {0:?}")]
    InvalidKubeQuantity(String),

    /// A Kubernetes API quantity was negative where a resource amount was expected.
    #[error("negative kubernetes quantity: {0:?}")]
    NegativeKubeQuantity(String),
}

impl QuantityError {
    /// The raw input that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::InvalidCpu(s)
            | Self::ZeroCpu(s)
            | Self::Overflow(s)
            | Self::InvalidKubeQuantity(s)
            | Self::NegativeKubeQuantity(s) => s,
        }
    }
}
