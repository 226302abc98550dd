use std::collections::VecDeque;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::{Alert, AlertThresholds, Node, Notification, NotificationCategory, Priority, Reading};
use crate::snapshot::LiveSnapshot;

pub const INBOX_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    All,
    Resolved,
    Unresolved,
}

impl FromStr for AlertStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(AlertStatus::All),
            "resolved" => Ok(AlertStatus::Resolved),
            "unresolved" => Ok(AlertStatus::Unresolved),
            other => Err(Error::invalid(format!("unknown alert status '{}'", other))),
        }
    }
}

/// Alert history shown in the alerts panel
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    alerts: Vec<Alert>,
}

impl AlertLog {
    pub fn new(alerts: Vec<Alert>) -> Self {
        Self { alerts }
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    pub fn all(&self) -> &[Alert] {
        &self.alerts
    }

    /// Alerts matching `status` and, when given, raised on `date` (UTC calendar day).
    pub fn filter(&self, status: AlertStatus, date: Option<NaiveDate>) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|alert| match status {
                AlertStatus::All => true,
                AlertStatus::Resolved => alert.resolved,
                AlertStatus::Unresolved => !alert.resolved,
            })
            .filter(|alert| date.map_or(true, |d| alert.timestamp.date_naive() == d))
            .cloned()
            .collect()
    }

    pub fn resolve(&mut self, id: &str) -> Result<Alert> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found(format!("alert '{}'", id)))?;

        if !alert.resolved {
            info!(alert = %alert.id, node = %alert.node_id, "Alert resolved");
        }
        alert.resolved = true;
        Ok(alert.clone())
    }

    pub fn active_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.resolved).count()
    }
}

/// Client-local notification preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub sound: bool,
    pub email: bool,
    pub push: bool,
    pub alerts: CategoryToggles,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            email: true,
            push: true,
            alerts: CategoryToggles::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryToggles {
    pub temperature: bool,
    pub humidity: bool,
    pub weight: bool,
    pub connectivity: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            temperature: true,
            humidity: true,
            weight: true,
            connectivity: true,
        }
    }
}

impl CategoryToggles {
    pub fn allows(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Temperature => self.temperature,
            NotificationCategory::Humidity => self.humidity,
            NotificationCategory::Weight => self.weight,
            NotificationCategory::Connectivity => self.connectivity,
        }
    }
}

/// Turns live readings into notifications
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn evaluate(
        &self,
        settings: &NotificationSettings,
        node: &Node,
        current: &Reading,
        previous: Option<&Reading>,
    ) -> Vec<Notification> {
        let mut notifications = Vec::new();
        if !settings.enabled {
            return notifications;
        }
        let t = &self.thresholds;

        if settings.alerts.allows(NotificationCategory::Temperature)
            && (current.temperature > t.temperature_high || current.temperature < t.temperature_low)
        {
            notifications.push(Notification::new(
                NotificationCategory::Temperature,
                Priority::High,
                node,
                "Temperature alert",
                format!("Temperature out of normal range: {}°C", current.temperature_label()),
            ));
        }

        if settings.alerts.allows(NotificationCategory::Humidity)
            && (current.humidity > t.humidity_high || current.humidity < t.humidity_low)
        {
            notifications.push(Notification::new(
                NotificationCategory::Humidity,
                Priority::Medium,
                node,
                "Humidity alert",
                format!("Humidity out of normal range: {}%", current.humidity_label()),
            ));
        }

        if settings.alerts.allows(NotificationCategory::Weight) && node.is_hive() {
            if let Some(weight) = current.weight {
                let before = previous.and_then(|r| r.weight).unwrap_or(weight);
                let loss = before - weight;
                if loss > t.weight_loss_kg {
                    notifications.push(Notification::new(
                        NotificationCategory::Weight,
                        Priority::High,
                        node,
                        "Weight alert",
                        format!("Significant weight loss detected: -{:.1}kg", loss),
                    ));
                }
            }
        }

        notifications
    }

    /// Evaluates every roster node that has a reading in `snapshot`.
    pub fn evaluate_snapshot(
        &self,
        settings: &NotificationSettings,
        snapshot: &LiveSnapshot,
        nodes: &[Node],
    ) -> Vec<Notification> {
        nodes
            .iter()
            .filter_map(|node| snapshot.current(&node.id).map(|reading| (node, reading)))
            .flat_map(|(node, reading)| self.evaluate(settings, node, reading, snapshot.previous(&node.id)))
            .collect()
    }
}

/// Most recent notifications, newest first
#[derive(Debug, Clone, Default)]
pub struct NotificationInbox {
    entries: VecDeque<Notification>,
    settings: NotificationSettings,
}

impl NotificationInbox {
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            entries: VecDeque::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: NotificationSettings) {
        info!(enabled = settings.enabled, "Notification settings updated");
        self.settings = settings;
    }

    /// Adds a notification, returning its id. Nothing is stored while notifications are disabled.
    pub fn push(&mut self, notification: Notification) -> Option<String> {
        if !self.settings.enabled {
            return None;
        }

        warn!(
            node = %notification.node_id,
            category = ?notification.category,
            priority = ?notification.priority,
            "{}",
            notification.message
        );
        if self.settings.sound {
            debug!(id = %notification.id, "Notification sound requested");
        }
        if self.settings.push {
            debug!(id = %notification.id, "Push notification requested");
        }
        if self.settings.email && notification.priority == Priority::High {
            info!(node = %notification.node_id, title = %notification.title, "Dispatching email notification");
        }

        let id = notification.id.clone();
        self.entries.push_front(notification);
        self.entries.truncate(INBOX_CAPACITY);
        Some(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mark_read(&mut self, id: &str) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found(format!("notification '{}'", id)))?;
        entry.read = true;
        Ok(())
    }

    pub fn mark_all_read(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.read = true;
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<Notification> {
        let index = self
            .entries
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| Error::not_found(format!("notification '{}'", id)))?;
        self.entries
            .remove(index)
            .ok_or_else(|| Error::not_found(format!("notification '{}'", id)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    pub fn by_category(&self, category: NotificationCategory) -> Vec<&Notification> {
        self.entries.iter().filter(|n| n.category == category).collect()
    }
}
