// Installation and removal of the host route to the pod network

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::sync::Arc;

use super::RouteState;
use super::lookup::classify;
use crate::context::Context;
use crate::error::{RoutingError, RoutingResult};
use crate::exec::CommandRunner;
use crate::platform::Platform;

/// Manages the route `pod_cidr -> vm_address` for one profile.
///
/// Either input may be missing; the operations that need it then do nothing,
/// so a manager can be built even when discovery only partly succeeded.
pub struct RouteManager {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
    vm_address: Option<Ipv4Addr>,
    pod_cidr: Option<Ipv4Network>,
    profile: String,
}

impl RouteManager {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        platform: Platform,
        vm_address: Option<Ipv4Addr>,
        pod_cidr: Option<Ipv4Network>,
        profile: &str,
    ) -> Self {
        RouteManager {
            runner,
            platform,
            vm_address,
            pod_cidr,
            profile: profile.to_string(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Install the pod route unless an identical one is already in place.
    pub async fn setup_pod_routing(&self, ctx: &Context) -> RoutingResult<()> {
        if !self.platform.supports_pod_routing() {
            tracing::debug!("Pod routing setup is only supported on macOS");
            return Ok(());
        }

        let (Some(vm_address), Some(pod_cidr)) = (self.vm_address, self.pod_cidr) else {
            tracing::debug!("VM IP or Pod CIDR not available, skipping Pod routing setup");
            return Ok(());
        };

        tracing::info!(
            "Setting up Pod network routing for {}: {} -> {}",
            self.profile,
            pod_cidr,
            vm_address
        );

        match self.route_state(ctx, pod_cidr, Some(vm_address)).await {
            RouteState::Matching => {
                tracing::debug!("Pod network route already exists");
                return Ok(());
            }
            RouteState::Stale { gateway } => {
                tracing::info!(
                    "Replacing stale Pod network route {} via {}",
                    pod_cidr,
                    gateway.map_or_else(|| "unknown gateway".to_string(), |g| g.to_string())
                );
                self.delete_route(ctx, pod_cidr).await;
            }
            RouteState::Absent => {}
        }

        let cidr = pod_cidr.to_string();
        let gateway = vm_address.to_string();
        let out = self
            .runner
            .run(ctx, "sudo", &["route", "add", &cidr, &gateway])
            .await?;
        if !out.success {
            return Err(RoutingError::RouteInstallFailed {
                reason: out.status,
                output: out.output.trim().to_string(),
            });
        }

        tracing::info!("Pod network route configured successfully: {} -> {}", pod_cidr, vm_address);
        Ok(())
    }

    /// Remove the pod route if present. Never fails because of the delete
    /// itself: a route left behind must not hold up VM shutdown.
    pub async fn cleanup_pod_routing(&self, ctx: &Context) -> RoutingResult<()> {
        if !self.platform.supports_pod_routing() {
            tracing::debug!("Pod routing cleanup is only supported on macOS");
            return Ok(());
        }

        let Some(pod_cidr) = self.pod_cidr else {
            tracing::debug!("Pod CIDR not available, skipping Pod routing cleanup");
            return Ok(());
        };

        tracing::info!("Cleaning up Pod network routing for {}: {}", self.profile, pod_cidr);

        if self.route_state(ctx, pod_cidr, self.vm_address).await != RouteState::Matching {
            tracing::debug!("Pod network route does not exist, nothing to cleanup");
            return Ok(());
        }

        if self.delete_route(ctx, pod_cidr).await {
            tracing::info!("Pod network route cleaned up successfully: {}", pod_cidr);
        }
        Ok(())
    }

    /// Whether the routing table holds the desired route right now
    pub async fn route_exists(&self, ctx: &Context) -> bool {
        match self.pod_cidr {
            Some(pod_cidr) => self.route_state(ctx, pod_cidr, self.vm_address).await == RouteState::Matching,
            None => false,
        }
    }

    async fn route_state(&self, ctx: &Context, pod_cidr: Ipv4Network, vm_address: Option<Ipv4Addr>) -> RouteState {
        let cidr = pod_cidr.to_string();
        match self.runner.run(ctx, "route", &["-n", "get", &cidr]).await {
            Ok(out) if out.success => classify(&out.output, pod_cidr, vm_address),
            Ok(out) => {
                tracing::debug!("route lookup for {} failed: {}", cidr, out.output.trim());
                RouteState::Absent
            }
            Err(e) => {
                tracing::debug!("route lookup for {} failed: {}", cidr, e);
                RouteState::Absent
            }
        }
    }

    /// Returns whether the route was deleted; failures are only logged
    async fn delete_route(&self, ctx: &Context, pod_cidr: Ipv4Network) -> bool {
        let cidr = pod_cidr.to_string();
        match self.runner.run(ctx, "sudo", &["route", "delete", &cidr]).await {
            Ok(out) if out.success => true,
            Ok(out) => {
                tracing::warn!(
                    "Failed to remove Pod network route: {}, output: {}",
                    out.status,
                    out.output.trim()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to remove Pod network route: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRouteTable;

    const CIDR: &str = "10.42.0.0/16";

    fn manager(table: &Arc<FakeRouteTable>, platform: Platform, vm: Option<&str>, cidr: Option<&str>) -> RouteManager {
        RouteManager::new(
            table.clone(),
            platform,
            vm.map(|v| v.parse().unwrap()),
            cidr.map(|c| c.parse().unwrap()),
            "default",
        )
    }

    #[tokio::test]
    async fn test_setup_adds_route() {
        let table = Arc::new(FakeRouteTable::new());
        let ctx = Context::background();
        manager(&table, Platform::MacOs, Some("192.168.105.2"), Some(CIDR))
            .setup_pod_routing(&ctx)
            .await
            .unwrap();

        assert_eq!(
            table.calls(),
            vec![
                "route -n get 10.42.0.0/16".to_string(),
                "sudo route add 10.42.0.0/16 192.168.105.2".to_string(),
            ]
        );
        assert_eq!(table.gateway(CIDR), Some(Ipv4Addr::new(192, 168, 105, 2)));
    }

    #[tokio::test]
    async fn test_setup_twice_adds_once() {
        let table = Arc::new(FakeRouteTable::new());
        let ctx = Context::background();
        let rm = manager(&table, Platform::MacOs, Some("192.168.105.2"), Some(CIDR));

        rm.setup_pod_routing(&ctx).await.unwrap();
        rm.setup_pod_routing(&ctx).await.unwrap();

        assert_eq!(
            table.mutations(),
            vec!["sudo route add 10.42.0.0/16 192.168.105.2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_setup_replaces_route_to_prefix_superstring() {
        let table = Arc::new(FakeRouteTable::new().with_route(CIDR, "192.168.105.20"));
        let ctx = Context::background();
        manager(&table, Platform::MacOs, Some("192.168.105.2"), Some(CIDR))
            .setup_pod_routing(&ctx)
            .await
            .unwrap();

        assert_eq!(
            table.mutations(),
            vec![
                "sudo route delete 10.42.0.0/16".to_string(),
                "sudo route add 10.42.0.0/16 192.168.105.2".to_string(),
            ]
        );
        assert_eq!(table.gateway(CIDR), Some(Ipv4Addr::new(192, 168, 105, 2)));
    }

    #[tokio::test]
    async fn test_setup_failure_carries_output() {
        let table = Arc::new(FakeRouteTable::new().failing_add());
        let ctx = Context::background();
        let err = manager(&table, Platform::MacOs, Some("192.168.105.2"), Some(CIDR))
            .setup_pod_routing(&ctx)
            .await
            .unwrap_err();

        match err {
            RoutingError::RouteInstallFailed { reason, output } => {
                assert_eq!(reason, "exit status: 1");
                assert!(output.contains("Operation not permitted"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_setup_noop_without_inputs_or_platform() {
        let table = Arc::new(FakeRouteTable::new());
        let ctx = Context::background();

        manager(&table, Platform::Other, Some("192.168.105.2"), Some(CIDR))
            .setup_pod_routing(&ctx)
            .await
            .unwrap();
        manager(&table, Platform::MacOs, None, Some(CIDR))
            .setup_pod_routing(&ctx)
            .await
            .unwrap();
        manager(&table, Platform::MacOs, Some("192.168.105.2"), None)
            .setup_pod_routing(&ctx)
            .await
            .unwrap();

        assert!(table.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_without_route_is_noop() {
        let table = Arc::new(FakeRouteTable::new());
        let ctx = Context::background();
        manager(&table, Platform::MacOs, None, Some(CIDR))
            .cleanup_pod_routing(&ctx)
            .await
            .unwrap();

        assert_eq!(table.calls(), vec!["route -n get 10.42.0.0/16".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_deletes_route() {
        let table = Arc::new(FakeRouteTable::new().with_route(CIDR, "192.168.105.2"));
        let ctx = Context::background();
        manager(&table, Platform::MacOs, None, Some(CIDR))
            .cleanup_pod_routing(&ctx)
            .await
            .unwrap();

        assert_eq!(table.mutations(), vec!["sudo route delete 10.42.0.0/16".to_string()]);
        assert_eq!(table.gateway(CIDR), None);
    }

    #[tokio::test]
    async fn test_cleanup_swallows_delete_failure() {
        let table = Arc::new(FakeRouteTable::new().with_route(CIDR, "192.168.105.2").failing_delete());
        let ctx = Context::background();
        manager(&table, Platform::MacOs, None, Some(CIDR))
            .cleanup_pod_routing(&ctx)
            .await
            .unwrap();

        assert_eq!(table.mutations(), vec!["sudo route delete 10.42.0.0/16".to_string()]);
        assert!(table.gateway(CIDR).is_some());
    }

    #[tokio::test]
    async fn test_route_exists_requires_exact_gateway() {
        let table = Arc::new(FakeRouteTable::new().with_route(CIDR, "192.168.105.20"));
        let ctx = Context::background();

        assert!(!manager(&table, Platform::MacOs, Some("192.168.105.2"), Some(CIDR)).route_exists(&ctx).await);
        assert!(manager(&table, Platform::MacOs, Some("192.168.105.20"), Some(CIDR)).route_exists(&ctx).await);
        assert!(!manager(&table, Platform::MacOs, Some("192.168.105.20"), None).route_exists(&ctx).await);
    }

    #[tokio::test]
    async fn test_cancelled_setup_propagates() {
        let table = Arc::new(FakeRouteTable::new());
        let (ctx, handle) = Context::new(crate::context::DEFAULT_COMMAND_TIMEOUT);
        handle.cancel();
        let err = manager(&table, Platform::MacOs, Some("192.168.105.2"), Some(CIDR))
            .setup_pod_routing(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Cancelled(_)));
    }
}
