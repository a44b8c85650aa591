//! External commands run as child processes

use async_trait::async_trait;
use std::path::PathBuf;
use tether_core::{CommandExecutor, CommandOutput, Result, TetherError};
use tokio::process::Command;

/// Runs commands with `tokio::process`, capturing stdout and stderr
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    #[tracing::instrument(skip(self, args), fields(args = args.len()))]
    async fn execute(&self, command: &str, args: &[String]) -> Result<CommandOutput> {
        let mut cmd = Command::new(command);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| TetherError::Command(format!("failed to start '{}': {}", command, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            tracing::warn!(status = %output.status, "command failed");
            return Err(TetherError::Command(format!(
                "'{}' exited with {}: {}",
                command,
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(stdout_bytes = stdout.len(), "command finished");
        Ok(CommandOutput { stdout, stderr })
    }
}
