//! Established MongoDB session

use async_trait::async_trait;
use bson::doc;
use mongodb::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tether_core::{EngineSession, QueryResult, Result, TetherError, Value, sanitize_message};

use crate::command::{parse_command, reply_to_result};

/// How long `close` waits for the client to shut down
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A MongoDB client bound to one database
pub struct MongoDbSession {
    client: Client,
    database: String,
    closed: AtomicBool,
}

impl MongoDbSession {
    pub(crate) fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            closed: AtomicBool::new(false),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TetherError::NotInitialized(
                "MongoDB session is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineSession for MongoDbSession {
    async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| {
                TetherError::Engine(format!("ping failed: {}", sanitize_message(&e.to_string())))
            })?;
        Ok(())
    }

    #[tracing::instrument(skip(self, operation, params), fields(database = %self.database))]
    async fn query(&self, operation: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let started = Instant::now();
        let command = parse_command(operation, params)?;
        let command_name = command.keys().next().cloned().unwrap_or_default();

        let reply = self
            .client
            .database(&self.database)
            .run_command(command)
            .await
            .map_err(|e| {
                TetherError::QueryFailed(format!(
                    "MongoDB command '{}' failed: {}",
                    command_name,
                    sanitize_message(&e.to_string())
                ))
            })?;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let result = reply_to_result(reply)?.with_execution_time_ms(execution_time_ms);
        tracing::debug!(
            command = %command_name,
            row_count = result.row_count(),
            execution_time_ms,
            "command executed"
        );
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, self.client.clone().shutdown()).await {
            Ok(()) => {
                tracing::debug!("MongoDB client shut down");
                Ok(())
            }
            Err(_) => Err(TetherError::DisconnectFailed(format!(
                "MongoDB client did not shut down within {}ms",
                CLOSE_TIMEOUT.as_millis()
            ))),
        }
    }
}
