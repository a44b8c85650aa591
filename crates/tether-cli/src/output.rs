//! Terminal rendering for health and metrics

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets};
use tether_connection::HealthSummary;
use tether_core::{HealthReport, HealthState, Value};
use tether_monitor::MetricsSnapshot;

fn status_color(state: HealthState) -> Color {
    match state {
        HealthState::Ready => Color::Green,
        HealthState::Initializing => Color::Yellow,
        HealthState::Unhealthy => Color::Red,
    }
}

fn detail_text(report: &HealthReport, key: &str) -> String {
    match report.detail(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per adapter
pub fn health_table(summary: &HealthSummary) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Adapter", "Status", "Engine", "Latency (ms)", "Error"]);

    for report in &summary.reports {
        let status = match report.status {
            HealthState::Ready => "ready",
            HealthState::Initializing => "initializing",
            HealthState::Unhealthy => "unhealthy",
        };
        table.add_row(vec![
            Cell::new(&report.service).add_attribute(Attribute::Bold),
            Cell::new(status).fg(status_color(report.status)),
            Cell::new(detail_text(report, "engine")),
            Cell::new(detail_text(report, "latencyMs")),
            Cell::new(detail_text(report, "error")),
        ]);
    }
    table
}

/// One-line aggregated status, e.g. `status: degraded (1/2 ready)`
pub fn status_line(summary: &HealthSummary) -> String {
    let ready = summary.reports.iter().filter(|r| r.is_ready()).count();
    format!(
        "status: {} ({}/{} ready)",
        summary.status,
        ready,
        summary.reports.len()
    )
}

pub fn metrics_table(snapshot: &MetricsSnapshot) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Metric", "Value"]);
    let rows = [
        ("queries", snapshot.queries.total.to_string()),
        ("successful", snapshot.queries.successful.to_string()),
        ("failed", snapshot.queries.failed.to_string()),
        (
            "avg duration (ms)",
            format!("{:.1}", snapshot.queries.average_duration),
        ),
        (
            "p95 duration (ms)",
            format!("{:.1}", snapshot.queries.p95_duration),
        ),
        ("active connections", snapshot.connections.active.to_string()),
        (
            "connection attempts",
            snapshot.connections.total_attempts.to_string(),
        ),
    ];
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key).fg(Color::Cyan), Cell::new(value)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(reports: Vec<HealthReport>) -> HealthSummary {
        HealthSummary {
            status: tether_connection::aggregate(&reports),
            reports,
            checked_at: Default::default(),
        }
    }

    #[test]
    fn test_health_table_lists_every_adapter() {
        let summary = summary(vec![
            HealthReport::ready("orders")
                .with_detail("engine", "postgres")
                .with_detail("latencyMs", 3),
            HealthReport::unhealthy("catalog", "adapter is not connected"),
        ]);

        let rendered = health_table(&summary).to_string();
        assert!(rendered.contains("orders"));
        assert!(rendered.contains("postgres"));
        assert!(rendered.contains("catalog"));
        assert!(rendered.contains("adapter is not connected"));
    }

    #[test]
    fn test_status_line_counts_ready_adapters() {
        let summary = summary(vec![
            HealthReport::ready("orders"),
            HealthReport::unhealthy("catalog", "probe failed"),
        ]);
        assert_eq!(status_line(&summary), "status: degraded (1/2 ready)");
    }

    #[test]
    fn test_empty_summary_is_unhealthy() {
        assert_eq!(status_line(&summary(vec![])), "status: unhealthy (0/0 ready)");
    }
}
