// Profile-level entry points called by the VM lifecycle around start and stop
//
// Pod routing is a convenience. Every "log it and carry on" decision lives
// here, so the lower layers can report failures plainly.

use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::config::Config;
use crate::context::Context;
use crate::discovery::{default_pod_cidr, discover_pod_cidr, discover_vm_address};
use crate::error::RoutingResult;
use crate::exec::CommandRunner;
use crate::platform::Platform;
use crate::routes::RouteManager;
use crate::vm::VmControl;

/// Read-only view of the pod routing state for a profile
#[derive(Debug, Clone, Serialize)]
pub struct RoutingStatus {
    pub profile: String,
    pub platform: String,
    pub enabled: bool,
    pub vm_address: Option<Ipv4Addr>,
    pub vm_address_error: Option<String>,
    pub pod_cidr: Option<Ipv4Network>,
    pub pod_cidr_error: Option<String>,
    pub route_installed: bool,
}

pub struct PodRouting {
    runner: Arc<dyn CommandRunner>,
    vm: Arc<dyn VmControl>,
    platform: Platform,
}

impl PodRouting {
    pub fn new(runner: Arc<dyn CommandRunner>, vm: Arc<dyn VmControl>) -> Self {
        PodRouting {
            runner,
            vm,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn route_manager(&self, vm_address: Option<Ipv4Addr>, pod_cidr: Option<Ipv4Network>, profile: &str) -> RouteManager {
        RouteManager::new(self.runner.clone(), self.platform, vm_address, pod_cidr, profile)
    }

    /// Call once the VM has started. Discovery problems are logged and
    /// ignored; only a failed route install is returned.
    pub async fn setup_for_profile(&self, ctx: &Context, config: &Config) -> RoutingResult<()> {
        if !config.kubernetes_enabled {
            tracing::debug!("Kubernetes not enabled, skipping Pod routing setup");
            return Ok(());
        }

        if !config.network_address {
            tracing::debug!("network.address not enabled, skipping Pod routing setup");
            return Ok(());
        }

        let profile = config.profile.as_str();

        let vm_address = match discover_vm_address(ctx, self.platform, self.vm.as_ref(), profile).await {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!("Failed to get VM IP for Pod routing: {}", e);
                return Ok(());
            }
        };

        let pod_cidr = match discover_pod_cidr(ctx, self.vm.as_ref()).await {
            Ok(cidr) => cidr,
            Err(e) => {
                tracing::warn!("Failed to get Pod CIDR for routing: {}", e);
                return Ok(());
            }
        };

        self.route_manager(Some(vm_address), Some(pod_cidr), profile)
            .setup_pod_routing(ctx)
            .await
    }

    /// Call before the VM finishes stopping. Proceeds with the default CIDR
    /// when the cluster can no longer be asked.
    pub async fn cleanup_for_profile(&self, ctx: &Context, config: &Config) -> RoutingResult<()> {
        if !config.kubernetes_enabled {
            tracing::debug!("Kubernetes not enabled, skipping Pod routing cleanup");
            return Ok(());
        }

        let pod_cidr = match discover_pod_cidr(ctx, self.vm.as_ref()).await {
            Ok(cidr) => cidr,
            Err(e) => {
                tracing::warn!("Failed to get Pod CIDR for routing cleanup: {}", e);
                default_pod_cidr()
            }
        };

        // The route is keyed by CIDR alone
        self.route_manager(None, Some(pod_cidr), &config.profile)
            .cleanup_pod_routing(ctx)
            .await
    }

    /// Report discovery results and whether the route is installed, without
    /// changing anything.
    pub async fn status_for_profile(&self, ctx: &Context, config: &Config) -> RoutingStatus {
        let profile = config.profile.as_str();
        let enabled = config.kubernetes_enabled && config.network_address;

        let (vm_address, vm_address_error) =
            match discover_vm_address(ctx, self.platform, self.vm.as_ref(), profile).await {
                Ok(addr) => (Some(addr), None),
                Err(e) => (None, Some(e.to_string())),
            };

        let (pod_cidr, pod_cidr_error) = match discover_pod_cidr(ctx, self.vm.as_ref()).await {
            Ok(cidr) => (Some(cidr), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let route_installed = match (self.platform.supports_pod_routing(), vm_address, pod_cidr) {
            (true, Some(_), Some(_)) => {
                self.route_manager(vm_address, pod_cidr, profile)
                    .route_exists(ctx)
                    .await
            }
            _ => false,
        };

        RoutingStatus {
            profile: profile.to_string(),
            platform: self.platform.to_string(),
            enabled,
            vm_address,
            vm_address_error,
            pod_cidr,
            pod_cidr_error,
            route_installed,
        }
    }
}
