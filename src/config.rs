//! Dashboard configuration.
//!
//! Settings come from TOML. The built-in default (`configs/default.toml`)
//! carries the demo roster; `--config` swaps in another file.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertLog, NotificationSettings};
use crate::error::{Error, Result};
use crate::generator::SampleRanges;
use crate::metrics::{Alert, AlertKind, AlertSeverity, AlertThresholds, Node, User};
use crate::roster::StaticRoster;

const DEFAULT_CONFIG: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/configs/default.toml"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logger {
    pub level: String,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Feed {
    pub refresh_interval_seconds: u64,
    pub online_window_seconds: i64,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 30,
            online_window_seconds: 300,
        }
    }
}

/// Alert entry seeded into the alert log at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlert {
    pub node_id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    /// Age of the alert relative to startup
    #[serde(default)]
    pub minutes_ago: i64,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logger: Logger,
    #[serde(default)]
    pub feed: Feed,
    #[serde(default)]
    pub ranges: SampleRanges,
    #[serde(default)]
    pub thresholds: AlertThresholds,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub alerts: Vec<SeedAlert>,
}

impl Settings {
    /// Built-in demo configuration
    pub fn new() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Loads `path` when given, the built-in configuration otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::new(),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.ranges.validate()?;

        if self.feed.refresh_interval_seconds == 0 {
            return Err(Error::Config("feed.refresh_interval_seconds must be positive".into()));
        }
        if self.feed.online_window_seconds <= 0 {
            return Err(Error::Config("feed.online_window_seconds must be positive".into()));
        }

        self.roster()?;

        for alert in &self.alerts {
            if !self.nodes.iter().any(|n| n.id == alert.node_id) {
                return Err(Error::Config(format!("alert refers to unknown node '{}'", alert.node_id)));
            }
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.feed.refresh_interval_seconds)
    }

    pub fn online_window(&self) -> Duration {
        Duration::seconds(self.feed.online_window_seconds)
    }

    pub fn roster(&self) -> Result<StaticRoster> {
        StaticRoster::new(self.nodes.clone(), self.users.clone())
    }

    /// Alert log with seed alerts timestamped relative to `now`
    pub fn alert_log(&self, now: DateTime<Utc>) -> AlertLog {
        AlertLog::new(
            self.alerts
                .iter()
                .map(|seed| {
                    Alert::new(&seed.node_id, seed.kind, seed.severity, &seed.message)
                        .at(now - Duration::minutes(seed.minutes_ago))
                        .resolved(seed.resolved)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{NodeKind, Role};
    use crate::roster::RosterProvider;

    #[test]
    fn test_default_config_loads() {
        let settings = Settings::new().unwrap();
        assert_eq!(settings.nodes.len(), 8);
        assert_eq!(settings.nodes.iter().filter(|n| n.kind == NodeKind::Hive).count(), 4);
        assert_eq!(settings.users.iter().filter(|u| u.role == Role::Admin).count(), 1);
        assert_eq!(settings.refresh_interval(), StdDuration::from_secs(30));
        assert_eq!(settings.online_window(), Duration::minutes(5));
        assert_eq!(settings.ranges, SampleRanges::default());
        assert_eq!(settings.thresholds, AlertThresholds::default());
        assert_eq!(settings.roster().unwrap().nodes().len(), 8);
    }

    #[test]
    fn test_seed_alerts_are_relative_to_now() {
        let settings = Settings::new().unwrap();
        let now = Utc::now();
        let log = settings.alert_log(now);
        assert_eq!(log.all().len(), 4);
        assert_eq!(log.active_count(), 3);
        assert_eq!(log.all()[0].timestamp, now - Duration::hours(2));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let settings = Settings::parse(
            r#"
            [[nodes]]
            id = "hive-1"
            name = "Hive 1"
            kind = "hive"
            latitude = 1.0
            longitude = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(settings.logger.level, "info");
        assert_eq!(settings.feed.refresh_interval_seconds, 30);
        assert!(settings.notifications.enabled);
        assert_eq!(settings.nodes[0].owner, None);
    }

    #[test]
    fn test_partial_logger_table_uses_default_level() {
        let settings = Settings::parse("[logger]\n").unwrap();
        assert_eq!(settings.logger.level, "info");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let empty_range = r#"
            [ranges.temperature]
            low = 35.0
            high = 20.0
        "#;
        assert!(Settings::parse(empty_range).is_err());

        let bad_kind = r#"
            [[nodes]]
            id = "x"
            name = "x"
            kind = "drone"
            latitude = 0.0
            longitude = 0.0
        "#;
        assert!(matches!(Settings::parse(bad_kind), Err(Error::Config(_))));

        let orphan_alert = r#"
            [[alerts]]
            node_id = "ghost"
            kind = "connection_lost"
            severity = "critical"
            message = "gone"
        "#;
        assert!(Settings::parse(orphan_alert).is_err());

        let duplicate_nodes = r#"
            [[nodes]]
            id = "hive-1"
            name = "Hive 1"
            kind = "hive"
            latitude = 0.0
            longitude = 0.0

            [[nodes]]
            id = "hive-1"
            name = "Hive 1 again"
            kind = "ambient"
            latitude = 0.0
            longitude = 0.0
        "#;
        assert!(matches!(Settings::parse(duplicate_nodes), Err(Error::Config(_))));

        let zero_refresh = r#"
            [feed]
            refresh_interval_seconds = 0
        "#;
        assert!(Settings::parse(zero_refresh).is_err());
    }
}
