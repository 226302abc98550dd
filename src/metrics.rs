use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sensor unit type. Hive sensors additionally report weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Hive,
    Ambient,
}

/// A logical sensor unit placed in the field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub latitude: f64,
    pub longitude: f64,
    /// Id of the beekeeper the node is assigned to. Not an ownership link.
    #[serde(default)]
    pub owner: Option<u32>,
}

impl Node {
    pub fn new(id: &str, name: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            latitude: 0.0,
            longitude: 0.0,
            owner: None,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn with_owner(mut self, owner: u32) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_hive(&self) -> bool {
        self.kind == NodeKind::Hive
    }
}

/// One timestamped sample of sensor values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Reading {
    pub fn temperature_label(&self) -> String {
        format!("{:.1}", self.temperature)
    }

    pub fn humidity_label(&self) -> String {
        format!("{:.1}", self.humidity)
    }

    pub fn weight_label(&self) -> String {
        display_value(self.weight, 2)
    }
}

/// Formats an optional sensor value, using `--` when there is no data yet.
pub fn display_value(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "--".to_string(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Beekeeper,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Alert records shown in the alerts panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub node_id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

impl Alert {
    pub fn new(node_id: &str, kind: AlertKind, severity: AlertSeverity, message: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id: node_id.to_string(),
            kind,
            severity,
            message: message.to_string(),
            timestamp: Utc::now(),
            resolved: false,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn resolved(mut self, resolved: bool) -> Self {
        self.resolved = resolved;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighTemperature,
    LowTemperature,
    HighHumidity,
    LowHumidity,
    AbnormalWeight,
    ConnectionLost,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Temperature,
    Humidity,
    Weight,
    Connectivity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// An entry of the notification inbox
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub node_id: String,
    pub node_name: String,
    pub read: bool,
}

impl Notification {
    pub fn new(
        category: NotificationCategory,
        priority: Priority,
        node: &Node,
        title: &str,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            title: title.to_string(),
            message,
            priority,
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            read: false,
        }
    }
}

/// Thresholds for raising notifications from live readings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertThresholds {
    pub temperature_high: f64,
    pub temperature_low: f64,
    pub humidity_high: f64,
    pub humidity_low: f64,
    pub weight_loss_kg: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature_high: 35.0,
            temperature_low: 15.0,
            humidity_high: 80.0,
            humidity_low: 40.0,
            weight_loss_kg: 2.0,
        }
    }
}

/// Headline numbers of the administrator dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStatistics {
    pub total_nodes: usize,
    pub active_beekeepers: usize,
    pub active_alerts: usize,
    pub nodes_online: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Statistics over one generated chart series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesSummary {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub sample_count: usize,
    pub temperature: Option<MetricSummary>,
    pub humidity: Option<MetricSummary>,
    pub weight: Option<MetricSummary>,
}
