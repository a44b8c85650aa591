//! External command execution seam
//!
//! Operations that shell out (migrations, dumps, ad-hoc tools) go through
//! [`CommandExecutor`] so they can be swapped for a fake in tests.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external command to completion.
///
/// A non-zero exit status is a `TetherError::Command` failure carrying the
/// status and stderr.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str, args: &[String]) -> Result<CommandOutput>;
}
