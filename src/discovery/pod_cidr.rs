// Pod network CIDR discovery
//
// The cluster exposes its pod range differently depending on the active network
// plugin, and neither place is authoritative. Each source below is an
// independent extractor over guest command output; the first one that yields a
// value parsing as an IPv4 CIDR wins, and the k3s default covers the rest.

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::context::Context;
use crate::error::{RoutingError, RoutingResult};
use crate::vm::VmControl;

/// k3s default cluster CIDR
pub const DEFAULT_POD_CIDR: &str = "10.42.0.0/16";

const CLUSTER_CIDR_KEY: &str = "cluster-cidr=";
const NETWORK_KEY: &str = "Network";

pub fn default_pod_cidr() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 42, 0, 0), 16).expect("10.42.0.0/16 is a valid network")
}

/// A guest command plus the extractor that reads a CIDR out of its output
struct CidrSource {
    name: &'static str,
    command: &'static str,
    args: &'static [&'static str],
    extract: fn(&str) -> Option<Ipv4Network>,
}

const CIDR_SOURCES: &[CidrSource] = &[
    CidrSource {
        name: "cluster-info dump",
        command: "kubectl",
        args: &["cluster-info", "dump"],
        extract: cidr_from_cluster_info,
    },
    CidrSource {
        name: "flannel configmap",
        command: "kubectl",
        args: &["get", "configmap", "kube-flannel-cfg", "-n", "kube-system", "-o", "yaml"],
        extract: cidr_from_flannel_config,
    },
];

/// Find the pod network CIDR of the cluster running in the VM.
///
/// Fails only when the VM is not running. Once it is, this always resolves,
/// falling back to [`DEFAULT_POD_CIDR`] when no source yields a usable value.
pub async fn discover_pod_cidr(ctx: &Context, vm: &dyn VmControl) -> RoutingResult<Ipv4Network> {
    if !vm.running(ctx).await {
        return Err(RoutingError::VmNotRunning);
    }

    for source in CIDR_SOURCES {
        match vm.run_output(ctx, source.command, source.args).await {
            Ok(output) => {
                if let Some(cidr) = (source.extract)(&output) {
                    tracing::debug!("Pod CIDR {} found via {}", cidr, source.name);
                    return Ok(cidr);
                }
                tracing::debug!("No Pod CIDR in {} output", source.name);
            }
            Err(e) => tracing::debug!("Could not query {}: {}", source.name, e),
        }
    }

    tracing::debug!(
        "Failed to get Pod CIDR from cluster, using default k3s CIDR {}",
        DEFAULT_POD_CIDR
    );
    Ok(default_pod_cidr())
}

/// Scan `kubectl cluster-info dump` output for a `cluster-cidr=` assignment.
pub fn cidr_from_cluster_info(output: &str) -> Option<Ipv4Network> {
    output
        .lines()
        .flat_map(|line| {
            line.match_indices(CLUSTER_CIDR_KEY)
                .map(move |(i, _)| &line[i + CLUSTER_CIDR_KEY.len()..])
        })
        .find_map(cluster_cidr_value)
}

/// Read the value right after `cluster-cidr=`, quoted or bare
fn cluster_cidr_value(rest: &str) -> Option<Ipv4Network> {
    // JSON dumps escape embedded quotes
    let rest = match rest.strip_prefix('\\') {
        Some(r) if r.starts_with(['"', '\'']) => r,
        _ => rest,
    };

    let raw = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &rest[1..];
            let end = inner.find(quote)?;
            inner[..end].trim_end_matches('\\')
        }
        _ => {
            let end = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';' | ')' | ']' | '}'))
                .unwrap_or(rest.len());
            &rest[..end]
        }
    };

    // Dual-stack clusters list one range per family
    raw.split(',').map(str::trim).find_map(parse_cidr)
}

/// Scan the flannel configmap for its `"Network": "<cidr>"` entry.
pub fn cidr_from_flannel_config(output: &str) -> Option<Ipv4Network> {
    output
        .lines()
        .filter(|line| line.contains(NETWORK_KEY))
        .filter_map(|line| line.split_once(':'))
        .find_map(|(_, value)| {
            let value = value
                .trim()
                .trim_end_matches(',')
                .trim_end()
                .trim_matches(|c: char| c == '"' || c == '\'');
            parse_cidr(value)
        })
}

/// Only explicit `address/prefix` IPv4 notation counts
fn parse_cidr(candidate: &str) -> Option<Ipv4Network> {
    if !candidate.contains('/') {
        return None;
    }
    candidate.parse().ok()
}
