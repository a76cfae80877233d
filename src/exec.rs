// Execution of host commands: the privileged route mutations and the read-only lookup

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::context::Context;
use crate::error::{RoutingError, RoutingResult};

/// Result of running an external command to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 1`
    pub status: String,
    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        CommandOutput {
            success: true,
            status: "exit status: 0".to_string(),
            output: output.into(),
        }
    }

    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        CommandOutput {
            success: false,
            status: format!("exit status: {}", code),
            output: output.into(),
        }
    }
}

/// Runs a program on the host and captures its combined output.
///
/// Implementations must honour the context: return [`RoutingError::Cancelled`]
/// once it is cancelled and [`RoutingError::Timeout`] when the command outlives
/// the context's command timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, ctx: &Context, program: &str, args: &[&str]) -> RoutingResult<CommandOutput>;
}

/// Format a command the way a user would type it
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs commands with `tokio::process`, killing the child on cancel or timeout
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, ctx: &Context, program: &str, args: &[&str]) -> RoutingResult<CommandOutput> {
        let line = command_line(program, args);
        if ctx.is_cancelled() {
            return Err(RoutingError::Cancelled(line));
        }
        tracing::debug!("Executing: {}", line);

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        let child = command.output();

        let output = tokio::select! {
            result = child => result.map_err(|source| RoutingError::CommandExecution {
                command: line.clone(),
                source,
            })?,
            _ = ctx.cancelled() => return Err(RoutingError::Cancelled(line)),
            _ = tokio::time::sleep(ctx.command_timeout()) => {
                return Err(RoutingError::Timeout {
                    command: line,
                    seconds: ctx.command_timeout().as_secs(),
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::trace!("{} -> {}:\n{}", line, output.status, combined);

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            output: combined,
        })
    }
}
