// Comparison of a `route -n get` report against the desired pod route

use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr};

use super::parser::parse_route_get;
use super::{Route, RouteState};

/// Decide how the looked-up route relates to `cidr -> vm_address`.
///
/// Without a VM address any entry for the CIDR counts as matching, which is
/// what cleanup needs. The next hop is compared as a parsed address; only a
/// report lacking a `gateway:` line falls back to scanning for the address as a
/// whole token.
pub fn classify(output: &str, cidr: Ipv4Network, vm_address: Option<Ipv4Addr>) -> RouteState {
    let route = parse_route_get(output);

    match covers_cidr(&route, cidr) {
        Some(false) => return RouteState::Absent,
        Some(true) => {}
        // Unrecognised report: only trust an explicit address match
        None => {
            return match vm_address {
                Some(vm) if mentions_address(output, vm) => RouteState::Matching,
                Some(_) => RouteState::Absent,
                None => RouteState::Matching,
            };
        }
    }

    let Some(vm) = vm_address else {
        return RouteState::Matching;
    };

    match route.gateway {
        Some(gateway) if gateway == IpAddr::V4(vm) => RouteState::Matching,
        Some(gateway) => RouteState::Stale {
            gateway: Some(gateway),
        },
        None if mentions_address(output, vm) => RouteState::Matching,
        None => RouteState::Stale { gateway: None },
    }
}

/// Whether the reported destination is exactly `cidr`. `None` when the
/// report carries no destination at all.
fn covers_cidr(route: &Route, cidr: Ipv4Network) -> Option<bool> {
    let destination = route.destination.as_deref()?;
    if destination == "default" {
        return Some(false);
    }

    let Ok(network) = destination.parse::<Ipv4Addr>() else {
        return Some(false);
    };
    if network != cidr.network() {
        return Some(false);
    }

    // Host routes are printed without a mask
    let prefix_len = match route.mask {
        Some(mask) => mask_prefix_len(mask)?,
        None => 32,
    };
    Some(prefix_len == cidr.prefix())
}

/// Prefix length of a contiguous netmask
fn mask_prefix_len(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    let expected = if ones == 0 { 0 } else { 0xFFFFFFFFu32 << (32 - ones) };
    if bits == expected { Some(ones as u8) } else { None }
}

/// True when `addr` appears in `output` as a whole address, not as the prefix
/// of a longer one (`192.168.105.2` must not match `192.168.105.20`).
pub fn mentions_address(output: &str, addr: Ipv4Addr) -> bool {
    output
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|token| token.trim_matches('.'))
        .filter_map(|token| token.parse::<Ipv4Addr>().ok())
        .any(|candidate| candidate == addr)
}
