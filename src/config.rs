// Configuration management for pod-route
// Supports CLI arguments, config file (TOML), and environment variables

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::context::DEFAULT_COMMAND_TIMEOUT;
use crate::vm::lima::DEFAULT_INTERFACE;

/// pod-route - Route host traffic to the pod network of a VM-hosted Kubernetes cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "pod-route")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Profile (VM) to operate on
    #[arg(short, long, global = true, env = "PODROUTE_PROFILE")]
    pub profile: Option<String>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, env = "PODROUTE_LOG")]
    pub log_level: Option<String>,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "PODROUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Treat Kubernetes as disabled for this profile
    #[arg(long, global = true, env = "PODROUTE_NO_KUBERNETES")]
    pub no_kubernetes: bool,

    /// Treat the VM as having no host-reachable address
    #[arg(long, global = true, env = "PODROUTE_NO_NETWORK_ADDRESS")]
    pub no_network_address: bool,

    /// Lima instance name (defaults to one derived from the profile)
    #[arg(long, global = true, env = "PODROUTE_INSTANCE")]
    pub instance: Option<String>,

    /// Guest interface carrying the host-reachable address
    #[arg(long, global = true, env = "PODROUTE_INTERFACE")]
    pub interface: Option<String>,

    /// Timeout for each external command, in seconds
    #[arg(long, global = true, env = "PODROUTE_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Install the pod network route (run after the VM has started)
    Setup,
    /// Remove the pod network route (run before the VM stops)
    Cleanup,
    /// Show discovered addresses and whether the route is installed
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub vm: VmConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Whether the VM runs a Kubernetes cluster
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Whether the VM gets an address reachable from the host
    #[serde(default = "default_true")]
    pub address: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub instance: Option<String>,

    #[serde(default = "default_interface")]
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}
fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_secs()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_profile() -> String {
    "default".to_string()
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        KubernetesConfig {
            enabled: default_true(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            address: default_true(),
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            profile: None,
            instance: None,
            interface: default_interface(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub kubernetes_enabled: bool,
    pub network_address: bool,
    pub profile: String,
    pub instance: Option<String>,
    pub interface: String,
    pub command_timeout: Duration,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            kubernetes_enabled: true,
            network_address: true,
            profile: default_profile(),
            instance: None,
            interface: default_interface(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    /// Priority: CLI args / environment variables > Config file > Defaults
    pub fn load(cli_args: &CliArgs) -> anyhow::Result<Self> {
        let config_file = match &cli_args.config {
            Some(path) => read_config_file(path)?,
            None => {
                let default_paths = [PathBuf::from("pod-route.toml"), PathBuf::from("config.toml")];
                match default_paths.iter().find(|p| p.exists()) {
                    Some(path) => read_config_file(path)?,
                    None => ConfigFile::default(),
                }
            }
        };

        Self::merge(cli_args, config_file)
    }

    fn merge(cli_args: &CliArgs, config_file: ConfigFile) -> anyhow::Result<Self> {
        let log_level = parse_log_level(
            cli_args
                .log_level
                .as_deref()
                .unwrap_or(&config_file.logging.level),
        )?;

        let profile = cli_args
            .profile
            .clone()
            .or(config_file.vm.profile)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(default_profile);

        let command_timeout = Duration::from_secs(
            cli_args
                .command_timeout
                .unwrap_or(config_file.routing.command_timeout_seconds),
        );
        if command_timeout.is_zero() {
            anyhow::bail!("command timeout must be at least one second");
        }

        Ok(Config {
            kubernetes_enabled: !cli_args.no_kubernetes && config_file.kubernetes.enabled,
            network_address: !cli_args.no_network_address && config_file.network.address,
            profile,
            instance: cli_args.instance.clone().or(config_file.vm.instance),
            interface: cli_args
                .interface
                .clone()
                .unwrap_or(config_file.vm.interface),
            command_timeout,
            log_level,
        })
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    tracing::info!("Loading configuration from: {}", path.display());
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    toml::from_str::<ConfigFile>(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))
}

pub fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
