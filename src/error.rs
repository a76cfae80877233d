// Error types for pod network route reconciliation

use thiserror::Error;

/// Main error type for route discovery and installation
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Pod routing is only supported on macOS")]
    PlatformUnsupported,

    #[error("VM IP not available or is localhost")]
    AddressUnavailable,

    #[error("Invalid VM IP address: {0}")]
    InvalidAddress(String),

    #[error("VM not running")]
    VmNotRunning,

    #[error("Failed to add Pod network route: {reason}, output: {output}")]
    RouteInstallFailed { reason: String, output: String },

    #[error("Failed to execute command {command}: {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Guest command `{command}` failed: {output}")]
    GuestCommandFailed { command: String, output: String },

    #[error("Command cancelled: {0}")]
    Cancelled(String),

    #[error("Command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },
}

/// Result type alias using RoutingError
pub type RoutingResult<T> = Result<T, RoutingError>;

impl RoutingError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            RoutingError::PlatformUnsupported => {
                "Pod network routing is only available on macOS hosts.".to_string()
            }
            RoutingError::AddressUnavailable => {
                "The VM has no reachable address yet. Make sure network.address is enabled and the VM finished booting.".to_string()
            }
            RoutingError::InvalidAddress(addr) => {
                format!("The VM reported an address that is not a valid IPv4 address: {}", addr)
            }
            RoutingError::VmNotRunning => {
                "The VM is not running, so the cluster could not be queried.".to_string()
            }
            RoutingError::RouteInstallFailed { output, .. } => {
                format!(
                    "Could not add the Pod network route ({}). You can add it manually with `sudo route add <pod-cidr> <vm-ip>`.",
                    output.trim()
                )
            }
            RoutingError::CommandExecution { command, .. } => {
                format!("Failed to execute command. Make sure {} is installed.", command)
            }
            RoutingError::GuestCommandFailed { command, .. } => {
                format!("`{}` failed inside the VM. Is the cluster up?", command)
            }
            RoutingError::Cancelled(_) => "The operation was cancelled.".to_string(),
            RoutingError::Timeout { command, seconds } => {
                format!("`{}` did not finish within {}s.", command, seconds)
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RoutingError::AddressUnavailable | RoutingError::VmNotRunning | RoutingError::Timeout { .. }
        )
    }
}
