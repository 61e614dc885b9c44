//! Per-node replica feasibility.
//!
//! Given the headroom left on a node and the footprint of one replica, work
//! out how many more replicas fit. Division floors so a fractional replica
//! never counts, and the node's pod ceiling caps the answer regardless of
//! CPU and memory headroom.

use serde::{Deserialize, Serialize};

use crate::types::ResourceAsk;

/// Outcome of a feasibility estimate for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Estimate {
    /// Additional replicas the node can accept.
    pub spinnable: u64,
    /// Not enough CPU is left for even one replica.
    pub cpu_crunch: bool,
    /// Not enough memory is left for even one replica.
    pub memory_crunch: bool,
}

impl Estimate {
    const fn fits(spinnable: u64) -> Self {
        Self {
            spinnable,
            cpu_crunch: false,
            memory_crunch: false,
        }
    }

    const fn crunched(cpu_crunch: bool, memory_crunch: bool) -> Self {
        Self {
            spinnable: 0,
            cpu_crunch,
            memory_crunch,
        }
    }
}

/// Estimate how many replicas of `ask` fit in the remaining headroom.
///
/// CPU is checked before memory: when both are short only `cpu_crunch` is
/// set. Otherwise the smaller of the CPU and memory bounds binds, capped at
/// `allocatable_pods`. A zero ask in a dimension puts no bound on it.
#[must_use]
pub fn estimate(
    remaining_cpu: u64,
    remaining_memory: u64,
    ask: &ResourceAsk,
    allocatable_pods: u64,
) -> Estimate {
    if remaining_cpu < ask.cpu_millicores {
        return Estimate::crunched(true, false);
    }
    if remaining_memory < ask.memory_bytes {
        return Estimate::crunched(false, true);
    }

    let cpu_bound = bound(remaining_cpu, ask.cpu_millicores);
    let memory_bound = bound(remaining_memory, ask.memory_bytes);
    let binding = cpu_bound.min(memory_bound);

    if binding >= allocatable_pods {
        Estimate::fits(allocatable_pods)
    } else if binding >= 1 {
        Estimate::fits(binding)
    } else {
        Estimate::crunched(true, true)
    }
}

fn bound(remaining: u64, ask: u64) -> u64 {
    remaining.checked_div(ask).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapacity_core::GIGABYTE;

    fn ask(cpu: u64, memory: u64) -> ResourceAsk {
        ResourceAsk::new(cpu, memory)
    }

    #[test]
    fn cpu_binds() {
        let result = estimate(1000, 4 * GIGABYTE, &ask(500, GIGABYTE), 10);
        assert_eq!(result, Estimate::fits(2));
    }

    #[test]
    fn memory_binds() {
        let result = estimate(4000, 3 * GIGABYTE, &ask(500, GIGABYTE), 10);
        assert_eq!(result, Estimate::fits(3));
    }

    #[test]
    fn division_floors() {
        let result = estimate(1499, 10 * GIGABYTE, &ask(500, GIGABYTE), 10);
        assert_eq!(result.spinnable, 2);
    }

    #[test]
    fn cpu_crunch() {
        let result = estimate(100, GIGABYTE, &ask(500, GIGABYTE), 10);
        assert_eq!(
            result,
            Estimate {
                spinnable: 0,
                cpu_crunch: true,
                memory_crunch: false,
            }
        );
    }

    #[test]
    fn memory_crunch() {
        let result = estimate(1000, GIGABYTE / 2, &ask(500, GIGABYTE), 10);
        assert_eq!(
            result,
            Estimate {
                spinnable: 0,
                cpu_crunch: false,
                memory_crunch: true,
            }
        );
    }

    #[test]
    fn cpu_checked_before_memory() {
        let result = estimate(0, 0, &ask(500, GIGABYTE), 10);
        assert!(result.cpu_crunch);
        assert!(!result.memory_crunch);
    }

    #[test]
    fn capped_at_allocatable_pods() {
        let result = estimate(100_000, 100 * GIGABYTE, &ask(100, GIGABYTE), 10);
        assert_eq!(result, Estimate::fits(10));
    }

    #[test]
    fn bound_equal_to_allocatable_pods_is_capped() {
        let result = estimate(1000, 10 * GIGABYTE, &ask(100, GIGABYTE / 2), 10);
        assert_eq!(result, Estimate::fits(10));
    }

    #[test]
    fn tied_bounds_use_common_value() {
        let result = estimate(1500, 3 * GIGABYTE, &ask(500, GIGABYTE), 10);
        assert_eq!(result, Estimate::fits(3));
    }

    #[test]
    fn zero_memory_ask_leaves_cpu_binding() {
        let result = estimate(1000, 0, &ask(250, 0), 10);
        assert_eq!(result, Estimate::fits(4));
    }

    #[test]
    fn zero_ask_is_bounded_by_pods() {
        let result = estimate(0, 0, &ask(0, 0), 7);
        assert_eq!(result, Estimate::fits(7));
    }

    #[test]
    fn no_pod_slots() {
        let result = estimate(1000, 4 * GIGABYTE, &ask(500, GIGABYTE), 0);
        assert_eq!(result, Estimate::fits(0));
    }
}
