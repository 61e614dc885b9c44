//! Core quantity types and parsers for kapacity.
//!
//! This crate turns the human-readable resource strings used throughout
//! kapacity into canonical integer units:
//!
//! - **Ask quantities**: the CPU and memory strings a user passes on the
//!   command line ([`parse_cpu`], [`parse_memory`])
//! - **Errors**: [`QuantityError`], shared with the estimator's conversion of
//!   Kubernetes API quantities
//!
//! CPU is always expressed in millicores and memory in bytes.
//!
//! # Example
//!
//! ```
//! use kapacity_core::{parse_cpu, parse_memory, GIGABYTE};
//!
//! assert_eq!(parse_cpu("2").unwrap(), 2000);
//! assert_eq!(parse_cpu("500m").unwrap(), 500);
//! assert_eq!(parse_memory("1G"), GIGABYTE);
//!
//! // memory asks degrade to zero instead of failing
//! assert_eq!(parse_memory("garbage"), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod quantity;

pub use error::{QuantityError, Result};
pub use quantity::{parse_cpu, parse_memory, BYTE, GIGABYTE, KILOBYTE, MEGABYTE, TERABYTE};
