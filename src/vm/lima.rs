// Lima-backed VM control, driving `limactl` on the host

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::VmControl;
use crate::context::Context;
use crate::error::{RoutingError, RoutingResult};
use crate::exec::{CommandRunner, command_line};

/// Address reported when the guest interface has no usable address
pub const LOOPBACK: &str = "127.0.0.1";

/// Default guest interface carrying the host-reachable address
pub const DEFAULT_INTERFACE: &str = "col0";

/// Lima instance name for a profile: `colima` for the default profile,
/// `colima-<profile>` otherwise
pub fn instance_name(profile: &str) -> String {
    match profile {
        "" | "default" | "colima" => "colima".to_string(),
        p if p.starts_with("colima-") => p.to_string(),
        p => format!("colima-{}", p),
    }
}

#[derive(Debug, Deserialize)]
struct LimaInstance {
    name: String,
    #[serde(default)]
    status: String,
}

pub struct LimaVm {
    runner: Arc<dyn CommandRunner>,
    profile: String,
    instance: String,
    interface: String,
}

impl LimaVm {
    pub fn new(runner: Arc<dyn CommandRunner>, profile: &str) -> Self {
        LimaVm {
            runner,
            profile: profile.to_string(),
            instance: instance_name(profile),
            interface: DEFAULT_INTERFACE.to_string(),
        }
    }

    /// Override the Lima instance name derived from the profile
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    fn instance_for(&self, profile: &str) -> String {
        if profile == self.profile {
            self.instance.clone()
        } else {
            instance_name(profile)
        }
    }

    async fn shell(&self, ctx: &Context, instance: &str, command: &str, args: &[&str]) -> RoutingResult<(bool, String)> {
        let mut shell_args = vec!["shell", instance, command];
        shell_args.extend_from_slice(args);
        let out = self.runner.run(ctx, "limactl", &shell_args).await?;
        Ok((out.success, out.output))
    }
}

#[async_trait]
impl VmControl for LimaVm {
    async fn running(&self, ctx: &Context) -> bool {
        let out = match self
            .runner
            .run(ctx, "limactl", &["list", "--json", &self.instance])
            .await
        {
            Ok(out) if out.success => out,
            Ok(out) => {
                tracing::debug!("limactl list failed for {}: {}", self.instance, out.output.trim());
                return false;
            }
            Err(e) => {
                tracing::debug!("limactl list failed for {}: {}", self.instance, e);
                return false;
            }
        };
        parse_running(&out.output, &self.instance)
    }

    async fn run_output(&self, ctx: &Context, command: &str, args: &[&str]) -> RoutingResult<String> {
        let (success, output) = self.shell(ctx, &self.instance, command, args).await?;
        if !success {
            tracing::debug!(
                "guest command `{}` failed: {}",
                command_line(command, args),
                output.trim()
            );
            return Err(RoutingError::GuestCommandFailed {
                command: command_line(command, args),
                output: output.trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn ip_address(&self, ctx: &Context, profile: &str) -> String {
        let instance = self.instance_for(profile);
        match self
            .shell(ctx, &instance, "ip", &["-4", "-o", "addr", "show", &self.interface])
            .await
        {
            Ok((true, output)) => parse_inet_address(&output).unwrap_or_else(|| LOOPBACK.to_string()),
            Ok((false, output)) => {
                tracing::debug!("no address on {} in {}: {}", self.interface, instance, output.trim());
                LOOPBACK.to_string()
            }
            Err(e) => {
                tracing::debug!("could not query address of {}: {}", instance, e);
                LOOPBACK.to_string()
            }
        }
    }
}

/// `limactl list --json` prints one JSON object per instance per line
fn parse_running(output: &str, instance: &str) -> bool {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<LimaInstance>(line).ok())
        .any(|i| i.name == instance && i.status.eq_ignore_ascii_case("running"))
}

/// Extract the address from `ip -4 -o addr show` output, e.g.
/// `3: col0    inet 192.168.106.2/24 brd 192.168.106.255 scope global col0`
fn parse_inet_address(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        parts.find(|p| *p == "inet")?;
        let addr = parts.next()?;
        Some(addr.split('/').next().unwrap_or(addr).to_string())
    })
}
