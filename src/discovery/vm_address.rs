// VM address discovery

use std::net::Ipv4Addr;

use crate::context::Context;
use crate::error::{RoutingError, RoutingResult};
use crate::platform::Platform;
use crate::vm::VmControl;

/// Resolve the host-reachable IPv4 address of the VM for `profile`.
///
/// An empty or loopback answer means the VM has not brought its network up yet.
pub async fn discover_vm_address(
    ctx: &Context,
    platform: Platform,
    vm: &dyn VmControl,
    profile: &str,
) -> RoutingResult<Ipv4Addr> {
    if !platform.supports_pod_routing() {
        return Err(RoutingError::PlatformUnsupported);
    }

    let reported = vm.ip_address(ctx, profile).await;
    parse_vm_address(&reported)
}

fn parse_vm_address(reported: &str) -> RoutingResult<Ipv4Addr> {
    let reported = reported.trim();
    if reported.is_empty() {
        return Err(RoutingError::AddressUnavailable);
    }

    let addr: Ipv4Addr = reported
        .parse()
        .map_err(|_| RoutingError::InvalidAddress(reported.to_string()))?;
    if addr.is_loopback() {
        return Err(RoutingError::AddressUnavailable);
    }
    Ok(addr)
}
