//! Console rendering for capacity reports.

use std::fmt::Write as _;

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use kapacity_estimator::{ClusterReport, FeasibilityResult};

/// Version details baked in at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    /// Package version.
    pub version: &'static str,
    /// Build date, or `"unknown"` when not provided.
    pub build_date: &'static str,
}

impl BuildInfo {
    /// Build info for this binary.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            build_date: option_env!("KAPACITY_BUILD_DATE").unwrap_or("unknown"),
        }
    }
}

/// The ask strings exactly as the user typed them.
#[derive(Debug, Clone, Copy)]
pub struct AskEcho<'a> {
    pub cpu_request: &'a str,
    pub memory_request: &'a str,
    pub cpu_limit: &'a str,
    pub memory_limit: &'a str,
}

const ZERO_WORKERS_WARNING: &str = "\
W: Number of worker nodes is 0.
W: Add a worker node or label an existing node with 'node-role.kubernetes.io/node=true'.
";

const LEGENDS: &[(&str, &[(&str, &str)])] = &[
    (
        "Summary",
        &[
            ("Schedulable", "true if the requested replicas fit on the healthy worker nodes."),
            (
                "Overcommitted nodes",
                "worker nodes whose CPU/memory limits would exceed what they can deliver.",
            ),
            (
                "Unhealthy nodes",
                "nodes that are not Ready or report disk, memory, PID or network pressure.",
            ),
            ("Unlabelled nodes", "healthy nodes with neither a worker nor a control-plane role."),
        ],
    ),
    (
        "Spinnable pods",
        &[
            ("CpuCrunch", "true if the requested CPU is not available on the worker node."),
            ("MemCrunch", "true if the requested memory is not available on the worker node."),
            (
                "Spinnable",
                "additional replicas the worker node can accept with the requested resources.",
            ),
        ],
    ),
    (
        "Current capacity usage per node",
        &[
            ("Node", "worker node name."),
            ("CpuReq", "CPU requested on the node, as a share of allocatable CPU."),
            ("MemReq", "memory requested on the node, as a share of allocatable memory."),
            ("CpuLimit", "CPU limits set on the node, as a share of allocatable CPU."),
            ("MemLimit", "memory limits set on the node, as a share of allocatable memory."),
            ("Pods", "live pods on the node."),
        ],
    ),
];

/// Render the version banner.
pub fn version(info: &BuildInfo) -> String {
    format!("version:    {}\nbuild date: {}\n", info.version, info.build_date)
}

/// Render an explanation of every report column.
pub fn legends() -> String {
    LEGENDS
        .iter()
        .map(|(section, entries)| {
            let mut table = new_table();
            table.set_header(vec![Cell::new(*section), Cell::new("")]);
            for (name, meaning) in *entries {
                table.add_row(vec![Cell::new(*name), Cell::new(*meaning)]);
            }
            format!("{table}\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a report as console tables.
pub fn report(report: &ClusterReport, asks: &AskEcho<'_>) -> String {
    let mut out = String::new();

    if !report.nodes.is_empty() {
        let _ = writeln!(out, "{}\n", node_table(&report.nodes));
    }

    if report.worker_nodes == 0 {
        let _ = writeln!(out, "{ZERO_WORKERS_WARNING}");
    }

    let _ = writeln!(out, "{}\n", summary_table(report, asks));

    push_list(&mut out, "Nodes with overcommitted CPU/memory", &report.overcommitted_nodes);
    push_list(&mut out, "Unhealthy nodes", &report.unhealthy_nodes);
    if !report.unknown_role_nodes.is_empty() {
        push_list(&mut out, "Unlabelled nodes", &report.unknown_role_nodes);
    }

    out
}

/// Render a report as pretty-printed JSON.
pub fn json(report: &ClusterReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn node_table(nodes: &[FeasibilityResult]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Node"),
        Cell::new("CpuReq"),
        Cell::new("MemReq"),
        Cell::new("CpuLimit"),
        Cell::new("MemLimit"),
        Cell::new("Pods"),
        Cell::new("CpuCrunch"),
        Cell::new("MemCrunch"),
        Cell::new("Spinnable"),
    ]);

    for node in nodes {
        let usage = &node.utilization;
        table.add_row(vec![
            Cell::new(&node.node),
            Cell::new(format!("{:.2}%", usage.cpu_requested_pct)),
            Cell::new(format!("{:.2}%", usage.memory_requested_pct)),
            Cell::new(format!("{:.2}%", usage.cpu_limit_pct)),
            Cell::new(format!("{:.2}%", usage.memory_limit_pct)),
            Cell::new(node.live_workloads),
            Cell::new(node.cpu_crunch),
            Cell::new(node.memory_crunch),
            Cell::new(node.spinnable),
        ]);
    }

    table
}

fn summary_table(report: &ClusterReport, asks: &AskEcho<'_>) -> Table {
    let mut table = new_table();
    table
        .add_row(vec![
            Cell::new("Control-plane nodes"),
            Cell::new(report.control_plane_nodes),
            Cell::new("Worker nodes"),
            Cell::new(report.worker_nodes),
        ])
        .add_row(vec![
            Cell::new("Memory request"),
            Cell::new(asks.memory_request),
            Cell::new("Memory limit"),
            Cell::new(asks.memory_limit),
        ])
        .add_row(vec![
            Cell::new("CPU request"),
            Cell::new(asks.cpu_request),
            Cell::new("CPU limit"),
            Cell::new(asks.cpu_limit),
        ])
        .add_row(vec![
            Cell::new("Replicas requested"),
            Cell::new(report.request.replicas),
            Cell::new("Schedulable"),
            Cell::new(report.schedulable),
        ])
        .add_row(vec![
            Cell::new("Spinnable replicas"),
            Cell::new(report.net_replicas),
            Cell::new(""),
            Cell::new(""),
        ]);
    table
}

fn push_list(out: &mut String, title: &str, names: &[String]) {
    let _ = writeln!(out, "{title}: {}", names.len());
    for name in names {
        let _ = writeln!(out, "  - {name}");
    }
}
