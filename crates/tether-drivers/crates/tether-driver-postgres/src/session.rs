//! Established PostgreSQL session

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tether_core::{EngineSession, QueryResult, Result, Row, TetherError, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;

use crate::convert::{PgParam, column_to_value};

/// How long `close` waits for the connection task to wind down
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }
    format!("{} (code: {})", message, db_error.code().code())
}

fn query_error(context: &str, error: &tokio_postgres::Error) -> TetherError {
    TetherError::QueryFailed(format!("{}: {}", context, format_postgres_error(error)))
}

/// One client plus the task driving its connection
pub struct PostgresSession {
    client: Mutex<Option<Client>>,
    connection_task: Mutex<Option<JoinHandle<()>>>,
}

impl PostgresSession {
    pub(crate) fn new(client: Client, connection_task: JoinHandle<()>) -> Self {
        Self {
            client: Mutex::new(Some(client)),
            connection_task: Mutex::new(Some(connection_task)),
        }
    }

    fn closed() -> TetherError {
        TetherError::NotInitialized("PostgreSQL session is closed".to_string())
    }
}

#[async_trait]
impl EngineSession for PostgresSession {
    async fn ping(&self) -> Result<()> {
        let client = self.client.lock().await;
        let client = client.as_ref().ok_or_else(Self::closed)?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| TetherError::Engine(format!("ping failed: {}", format_postgres_error(&e))))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, operation, params), fields(sql_preview = %operation.chars().take(100).collect::<String>()))]
    async fn query(&self, operation: &str, params: &[Value]) -> Result<QueryResult> {
        let started = Instant::now();
        let client = self.client.lock().await;
        let client = client.as_ref().ok_or_else(Self::closed)?;

        // Prepare first so parameters can be bound to the declared types
        let statement = client
            .prepare(operation)
            .await
            .map_err(|e| query_error("failed to prepare statement", &e))?;

        let param_types = statement.params();
        if param_types.len() != params.len() {
            return Err(TetherError::QueryFailed(format!(
                "statement expects {} parameter(s), got {}",
                param_types.len(),
                params.len()
            )));
        }
        let bound = params
            .iter()
            .zip(param_types)
            .map(|(value, ty)| PgParam::from_json(value, ty))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        if statement.columns().is_empty() {
            let affected = client
                .execute(&statement, &refs)
                .await
                .map_err(|e| query_error("failed to execute statement", &e))?;
            let elapsed = started.elapsed().as_millis() as u64;
            tracing::debug!(affected_rows = affected, execution_time_ms = elapsed, "statement executed");
            return Ok(QueryResult::affected(affected).with_execution_time_ms(elapsed));
        }

        let pg_rows = client
            .query(&statement, &refs)
            .await
            .map_err(|e| query_error("failed to execute query", &e))?;

        // Column names come from the statement so empty results still carry them
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = pg_rows
            .iter()
            .map(|row| {
                let values = (0..columns.len()).map(|idx| column_to_value(row, idx)).collect();
                Row::new(columns.clone(), values)
            })
            .collect::<Vec<_>>();

        let execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(row_count = rows.len(), execution_time_ms, "query executed");

        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        // Dropping the client ends the connection task
        drop(self.client.lock().await.take());

        let Some(mut task) = self.connection_task.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {
                tracing::debug!("PostgreSQL connection closed");
                Ok(())
            }
            Ok(Err(e)) => Err(TetherError::DisconnectFailed(format!(
                "connection task failed: {}",
                e
            ))),
            Err(_) => {
                task.abort();
                Err(TetherError::DisconnectFailed(format!(
                    "connection did not close within {}ms",
                    CLOSE_TIMEOUT.as_millis()
                )))
            }
        }
    }
}
