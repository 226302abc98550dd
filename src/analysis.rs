use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use crate::alerts::{AlertLog, AlertStatus};
use crate::metrics::*;
use crate::roster::RosterProvider;
use crate::snapshot::LiveSnapshot;

const RULE: &str = "═══════════════════════════════════════════════════════════════════\n";
const SECTION: &str = "───────────────────────────────────────────────────────────────────\n";

pub fn dashboard_statistics(
    roster: &dyn RosterProvider,
    alerts: &AlertLog,
    snapshot: &LiveSnapshot,
    now: DateTime<Utc>,
) -> DashboardStatistics {
    DashboardStatistics {
        total_nodes: roster.nodes().len(),
        active_beekeepers: roster.users().iter().filter(|u| !u.is_admin()).count(),
        active_alerts: alerts.active_count(),
        nodes_online: snapshot.online_count(now),
    }
}

/// Min / mean / max of each metric over a chart series
pub fn summarize(readings: &[Reading]) -> SeriesSummary {
    let temperature: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
    let humidity: Vec<f64> = readings.iter().map(|r| r.humidity).collect();
    let weight: Vec<f64> = readings.iter().filter_map(|r| r.weight).collect();

    SeriesSummary {
        start_time: readings.first().map(|r| r.timestamp),
        end_time: readings.last().map(|r| r.timestamp),
        sample_count: readings.len(),
        temperature: metric_summary(&temperature),
        humidity: metric_summary(&humidity),
        weight: metric_summary(&weight),
    }
}

fn metric_summary(values: &[f64]) -> Option<MetricSummary> {
    if values.is_empty() {
        return None;
    }

    Some(MetricSummary {
        min: Statistics::min(values),
        mean: Statistics::mean(values),
        max: Statistics::max(values),
    })
}

pub fn generate_report(
    roster: &dyn RosterProvider,
    alerts: &AlertLog,
    snapshot: &LiveSnapshot,
    now: DateTime<Utc>,
) -> String {
    let stats = dashboard_statistics(roster, alerts, snapshot, now);
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                     Apiary Monitoring Report                      \n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("Generated: {}\n\n", now.format("%Y-%m-%d %H:%M:%S UTC")));

    report.push_str(SECTION);
    report.push_str("                             OVERVIEW                              \n");
    report.push_str(SECTION);
    report.push('\n');
    report.push_str(&format!("  Total Nodes:         {:>6}\n", stats.total_nodes));
    report.push_str(&format!("  Active Beekeepers:   {:>6}\n", stats.active_beekeepers));
    report.push_str(&format!("  Active Alerts:       {:>6}\n", stats.active_alerts));
    report.push_str(&format!("  Nodes Online:        {:>6}\n\n", stats.nodes_online));

    report.push_str(SECTION);
    report.push_str("                          CURRENT READINGS                         \n");
    report.push_str(SECTION);
    report.push('\n');

    let nodes = roster.nodes();
    if nodes.is_empty() {
        report.push_str("  No nodes configured.\n\n");
    } else {
        report.push_str(&format!(
            "  {:<12} {:<16} {:<8} {:<8} {:>8} {:>8} {:>8}\n",
            "Node", "Name", "Kind", "Status", "Temp °C", "Hum %", "Kg"
        ));
        for node in &nodes {
            let reading = snapshot.current(&node.id);
            report.push_str(&format!(
                "  {:<12} {:<16} {:<8} {:<8} {:>8} {:>8} {:>8}\n",
                node.id,
                truncate(&node.name, 16),
                kind_label(node.kind),
                status_label(snapshot.is_online(&node.id, now)),
                display_value(reading.map(|r| r.temperature), 1),
                display_value(reading.map(|r| r.humidity), 1),
                display_value(reading.and_then(|r| r.weight), 2),
            ));
        }
        report.push('\n');
    }

    report.push_str(SECTION);
    report.push_str("                           ACTIVE ALERTS                           \n");
    report.push_str(SECTION);
    report.push('\n');

    let mut active = alerts.filter(AlertStatus::Unresolved, None);
    if active.is_empty() {
        report.push_str("  No active alerts.\n\n");
    } else {
        active.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.timestamp.cmp(&a.timestamp)));
        for alert in &active {
            report.push_str(&format!(
                "  [{}] {:<8} {}: {}\n",
                alert.timestamp.format("%Y-%m-%d %H:%M"),
                severity_label(alert.severity),
                alert.node_id,
                alert.message
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                           END OF REPORT                           \n");
    report.push_str(RULE);

    report
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Hive => "hive",
        NodeKind::Ambient => "ambient",
    }
}

fn status_label(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}

fn severity_label(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Low => "LOW",
        AlertSeverity::Medium => "MEDIUM",
        AlertSeverity::High => "HIGH",
        AlertSeverity::Critical => "CRITICAL",
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        s.chars().take(width - 1).chain(std::iter::once('…')).collect()
    }
}
