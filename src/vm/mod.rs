// VM-control collaborator interface
//
// The VM lifecycle manager owns the virtual machine. Pod routing only needs to
// know whether it is up, run read-only queries in the guest, and learn the
// address the host can reach it on.

pub mod lima;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::RoutingResult;

#[async_trait]
pub trait VmControl: Send + Sync {
    /// Whether the VM is currently running
    async fn running(&self, ctx: &Context) -> bool;

    /// Run a read-only command inside the guest and return its combined output
    async fn run_output(&self, ctx: &Context, command: &str, args: &[&str]) -> RoutingResult<String>;

    /// Host-reachable address of the VM for `profile`. Empty or loopback when
    /// the VM has no such address (yet).
    async fn ip_address(&self, ctx: &Context, profile: &str) -> String;
}
