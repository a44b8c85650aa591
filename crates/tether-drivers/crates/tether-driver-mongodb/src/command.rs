//! Command documents in, query results out

use bson::{Bson, Document};
use tether_core::{QueryResult, Result, Row, TetherError, Value};

/// Build the command document for an operation.
///
/// `operation` is either a JSON document (`{"find": "orders", "limit": 5}`)
/// or a bare command name (`ping`). Keys of the first object parameter are
/// merged in, replacing keys of the same name.
pub fn parse_command(operation: &str, params: &[Value]) -> Result<Document> {
    let trimmed = operation.trim();
    let mut command = if trimmed.starts_with('{') {
        serde_json::from_str::<Document>(trimmed)
            .map_err(|e| TetherError::QueryFailed(format!("invalid command document: {}", e)))?
    } else if !trimmed.is_empty() && !trimmed.contains(char::is_whitespace) {
        let mut command = Document::new();
        command.insert(trimmed, 1);
        command
    } else {
        return Err(TetherError::QueryFailed(format!(
            "expected a command document or command name, got '{}'",
            trimmed
        )));
    };

    if command.is_empty() {
        return Err(TetherError::QueryFailed("command document is empty".to_string()));
    }

    if let Some(overrides) = params.iter().find(|p| p.is_object()) {
        let overrides = bson::to_document(overrides)
            .map_err(|e| TetherError::QueryFailed(format!("invalid command parameters: {}", e)))?;
        for (key, value) in overrides {
            command.insert(key, value);
        }
    }

    Ok(command)
}

fn count(reply: &Document, key: &str) -> Option<u64> {
    match reply.get(key)? {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        Bson::Double(n) if *n >= 0.0 => Some(*n as u64),
        _ => None,
    }
}

fn document_row(document: Document, columns: &mut Vec<String>) -> Row {
    let object = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(object) => object,
        _ => serde_json::Map::new(),
    };
    for key in object.keys() {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    Row::from_object(object)
}

/// Turn a command reply into rows.
///
/// Cursor replies (`find`, `aggregate`, ...) yield one row per document in
/// `cursor.firstBatch`; any other reply is a single row. `n` becomes the
/// affected-row count.
pub fn reply_to_result(mut reply: Document) -> Result<QueryResult> {
    let ok = match reply.get("ok") {
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Boolean(v)) => *v,
        _ => true,
    };
    if !ok {
        let message = reply.get_str("errmsg").unwrap_or("unknown error");
        return Err(TetherError::QueryFailed(format!("MongoDB error: {}", message)));
    }

    let affected_rows = count(&reply, "n").unwrap_or(0);
    let mut columns = Vec::new();

    let batch = match reply.get_document_mut("cursor") {
        Ok(cursor) => match cursor.remove("firstBatch") {
            Some(Bson::Array(batch)) => Some(batch),
            _ => Some(Vec::new()),
        },
        Err(_) => None,
    };

    let rows = match batch {
        Some(batch) => batch
            .into_iter()
            .filter_map(|item| match item {
                Bson::Document(document) => Some(document_row(document, &mut columns)),
                _ => None,
            })
            .collect(),
        None => vec![document_row(reply, &mut columns)],
    };

    Ok(QueryResult {
        columns,
        rows,
        affected_rows,
        execution_time_ms: 0,
    })
}
