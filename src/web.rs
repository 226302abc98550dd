use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    extract::{Path, Query, State},
    response::{Html, Json},
    routing::{delete, get, post},
    Router,
};
use chrono::{Local, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::alerts::{AlertEvaluator, AlertLog, AlertStatus, NotificationInbox, NotificationSettings};
use crate::analysis::{dashboard_statistics, summarize};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::generator::{chart_datasets, SeriesGenerator};
use crate::metrics::{display_value, Node, Reading};
use crate::period::Period;
use crate::roster::RosterProvider;
use crate::snapshot::{LiveFeed, LiveSnapshot, SharedSnapshot};

pub type SharedState = Arc<AppState>;

type ApiResult = std::result::Result<Json<Value>, Error>;

/// Everything the dashboard handlers share. All of it lives in memory.
pub struct AppState {
    pub roster: Arc<dyn RosterProvider>,
    pub generator: SeriesGenerator,
    pub snapshot: SharedSnapshot,
    pub alerts: RwLock<AlertLog>,
    pub inbox: RwLock<NotificationInbox>,
    pub evaluator: AlertEvaluator,
    rng: Mutex<StdRng>,
}

impl AppState {
    pub fn from_settings(settings: &Settings, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            roster: Arc::new(settings.roster()?),
            generator: SeriesGenerator::new(settings.ranges.clone())?,
            snapshot: Arc::new(RwLock::new(LiveSnapshot::new(settings.online_window()))),
            alerts: RwLock::new(settings.alert_log(Utc::now())),
            inbox: RwLock::new(NotificationInbox::new(settings.notifications.clone())),
            evaluator: AlertEvaluator::new(settings.thresholds.clone()),
            rng: Mutex::new(rng),
        })
    }

    /// Evaluates one refreshed snapshot into the inbox, returning how many notifications were stored.
    pub async fn process_tick(&self, snapshot: &LiveSnapshot, nodes: &[Node]) -> usize {
        let mut inbox = self.inbox.write().await;
        let notifications = self.evaluator.evaluate_snapshot(inbox.settings(), snapshot, nodes);
        notifications
            .into_iter()
            .filter_map(|notification| inbox.push(notification))
            .count()
    }
}

/// Starts the snapshot refresh and routes every tick through the alert evaluator.
///
/// The evaluation task ends on its own once the returned feed is dropped.
pub fn start_live_feed(state: &SharedState, refresh: StdDuration, seed: Option<u64>) -> LiveFeed {
    let (tx, mut rx) = mpsc::unbounded_channel::<(LiveSnapshot, Vec<Node>)>();

    let alert_state = state.clone();
    tokio::spawn(async move {
        while let Some((snapshot, nodes)) = rx.recv().await {
            let raised = alert_state.process_tick(&snapshot, &nodes).await;
            if raised > 0 {
                debug!(raised, tick = snapshot.ticks(), "Notifications raised");
            }
        }
        debug!("Alert evaluation stopped");
    });

    LiveFeed::spawn(
        state.roster.clone(),
        state.generator.ranges().clone(),
        refresh,
        seed,
        state.snapshot.clone(),
        move |snapshot, nodes| {
            let _ = tx.send((snapshot.clone(), nodes.to_vec()));
        },
    )
}

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/nodes", get(nodes_handler))
        .route("/api/current", get(current_handler))
        .route("/api/history", get(history_handler))
        .route("/api/statistics", get(statistics_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/alerts/:id/resolve", post(resolve_alert_handler))
        .route(
            "/api/notifications",
            get(notifications_handler).delete(clear_notifications_handler),
        )
        .route("/api/notifications/read", post(mark_all_read_handler))
        .route(
            "/api/notifications/settings",
            get(get_settings_handler).put(put_settings_handler),
        )
        .route("/api/notifications/entries/:id", delete(remove_notification_handler))
        .route("/api/notifications/entries/:id/read", post(mark_read_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_web_server(state: SharedState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Web server listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data
    }))
}

/// Query values the date pickers send empty when nothing is selected
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

#[derive(Deserialize)]
struct NodesQuery {
    user: Option<u32>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    node: Option<String>,
    period: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct AlertsQuery {
    status: Option<String>,
    date: Option<String>,
}

#[derive(Serialize)]
struct NodeStatus {
    node: Node,
    reading: Option<Reading>,
    online: bool,
    temperature: String,
    humidity: String,
    weight: String,
}

async fn nodes_handler(State(state): State<SharedState>, Query(params): Query<NodesQuery>) -> ApiResult {
    let nodes = match params.user {
        Some(id) => {
            let user = state.roster.find_user(id)?;
            state.roster.view_nodes(&user)
        }
        None => state.roster.nodes(),
    };
    Ok(success(nodes))
}

async fn current_handler(State(state): State<SharedState>) -> ApiResult {
    let now = Utc::now();
    let snapshot = state.snapshot.read().await;

    let nodes: Vec<NodeStatus> = state
        .roster
        .nodes()
        .into_iter()
        .map(|node| {
            let reading = snapshot.current(&node.id).copied();
            NodeStatus {
                online: snapshot.is_online(&node.id, now),
                temperature: display_value(reading.map(|r| r.temperature), 1),
                humidity: display_value(reading.map(|r| r.humidity), 1),
                weight: display_value(reading.and_then(|r| r.weight), 2),
                reading,
                node,
            }
        })
        .collect();

    Ok(success(json!({
        "tick": snapshot.ticks(),
        "nodes": nodes
    })))
}

async fn history_handler(State(state): State<SharedState>, Query(params): Query<HistoryQuery>) -> ApiResult {
    let node_id = non_empty(&params.node).ok_or_else(|| Error::invalid("missing node"))?;
    let node = state.roster.find_node(node_id)?;
    let period: Period = non_empty(&params.period).unwrap_or("day").parse()?;

    let readings = {
        let mut rng = state.rng.lock().await;
        match non_empty(&params.date) {
            Some(value) => state
                .generator
                .generate_for_selection(&mut *rng, &node, period, value, &Local)?,
            None => state.generator.generate(&mut *rng, &node, period, &Local::now())?,
        }
    };

    Ok(success(json!({
        "node": node,
        "period": period,
        "readings": readings,
        "datasets": chart_datasets(&readings),
        "summary": summarize(&readings)
    })))
}

async fn statistics_handler(State(state): State<SharedState>) -> ApiResult {
    let alerts = state.alerts.read().await;
    let snapshot = state.snapshot.read().await;
    let stats = dashboard_statistics(state.roster.as_ref(), &alerts, &snapshot, Utc::now());
    Ok(success(stats))
}

async fn alerts_handler(State(state): State<SharedState>, Query(params): Query<AlertsQuery>) -> ApiResult {
    let status: AlertStatus = non_empty(&params.status).unwrap_or("all").parse()?;
    let date = match non_empty(&params.date) {
        Some(value) => Some(
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| Error::invalid(format!("invalid date '{}'", value)))?,
        ),
        None => None,
    };

    let mut alerts = state.alerts.read().await.filter(status, date);
    alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(success(alerts))
}

async fn resolve_alert_handler(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let alert = state.alerts.write().await.resolve(&id)?;
    Ok(success(alert))
}

async fn notifications_handler(State(state): State<SharedState>) -> ApiResult {
    let inbox = state.inbox.read().await;
    Ok(success(json!({
        "unread": inbox.unread_count(),
        "notifications": inbox.entries().collect::<Vec<_>>()
    })))
}

async fn mark_all_read_handler(State(state): State<SharedState>) -> ApiResult {
    let mut inbox = state.inbox.write().await;
    inbox.mark_all_read();
    Ok(success(json!({ "unread": inbox.unread_count() })))
}

async fn mark_read_handler(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let mut inbox = state.inbox.write().await;
    inbox.mark_read(&id)?;
    Ok(success(json!({ "unread": inbox.unread_count() })))
}

async fn remove_notification_handler(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let removed = state.inbox.write().await.remove(&id)?;
    Ok(success(removed))
}

async fn clear_notifications_handler(State(state): State<SharedState>) -> ApiResult {
    state.inbox.write().await.clear();
    Ok(success(json!({ "unread": 0 })))
}

async fn get_settings_handler(State(state): State<SharedState>) -> ApiResult {
    let inbox = state.inbox.read().await;
    Ok(success(inbox.settings()))
}

async fn put_settings_handler(
    State(state): State<SharedState>,
    Json(settings): Json<NotificationSettings>,
) -> ApiResult {
    let mut inbox = state.inbox.write().await;
    inbox.update_settings(settings);
    Ok(success(inbox.settings()))
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Apiary Monitor - Dashboard</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/chartjs-adapter-date-fns"></script>
    <script src="https://cdn.tailwindcss.com"></script>
    <style>
        .status-online { color: #10b981; }
        .status-offline { color: #ef4444; }
        .severity-low { background-color: #3b82f6; }
        .severity-medium { background-color: #f59e0b; }
        .severity-high { background-color: #f97316; }
        .severity-critical { background-color: #ef4444; }
        .chart-container { position: relative; height: 280px; }
    </style>
</head>
<body class="bg-gray-900 text-gray-100 min-h-screen">
    <div class="container mx-auto px-4 py-6">
        <header class="mb-8 flex justify-between items-start">
            <div>
                <h1 class="text-3xl font-bold text-white mb-2">Apiary Monitor</h1>
                <p class="text-gray-400">Hive and ambient sensors at a glance</p>
            </div>
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700 text-sm">
                <label class="text-gray-400 block mb-1">Notifications</label>
                <p><span id="unread-count" class="font-semibold">0</span> unread</p>
                <button onclick="markAllRead()" class="bg-blue-600 hover:bg-blue-700 px-3 py-1 rounded mt-2">Mark all read</button>
            </div>
        </header>

        <div class="grid grid-cols-2 lg:grid-cols-4 gap-4 mb-8">
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700">
                <h3 class="text-gray-400 text-sm">Total Nodes</h3>
                <p id="stat-nodes" class="text-2xl font-bold">--</p>
            </div>
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700">
                <h3 class="text-gray-400 text-sm">Active Beekeepers</h3>
                <p id="stat-beekeepers" class="text-2xl font-bold">--</p>
            </div>
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700">
                <h3 class="text-gray-400 text-sm">Active Alerts</h3>
                <p id="stat-alerts" class="text-2xl font-bold">--</p>
            </div>
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700">
                <h3 class="text-gray-400 text-sm">Nodes Online</h3>
                <p id="stat-online" class="text-2xl font-bold">--</p>
            </div>
        </div>

        <div class="bg-gray-800 rounded-lg p-4 border border-gray-700 mb-8">
            <h2 class="text-xl font-semibold mb-4">Current Readings</h2>
            <table class="w-full text-sm">
                <thead class="text-gray-400 text-left">
                    <tr><th>Node</th><th>Name</th><th>Kind</th><th>Status</th><th>Temp (°C)</th><th>Humidity (%)</th><th>Weight (kg)</th></tr>
                </thead>
                <tbody id="current-body"></tbody>
            </table>
        </div>

        <div class="bg-gray-800 rounded-lg p-4 border border-gray-700 mb-8">
            <div class="flex flex-wrap gap-3 items-end mb-4">
                <h2 class="text-xl font-semibold mr-auto">History</h2>
                <select id="history-node" class="bg-gray-700 border border-gray-600 rounded px-3 py-1 text-sm"></select>
                <select id="history-period" class="bg-gray-700 border border-gray-600 rounded px-3 py-1 text-sm">
                    <option value="day">Day</option>
                    <option value="week">Week</option>
                    <option value="month">Month</option>
                    <option value="year">Year</option>
                </select>
                <input id="history-date" type="date" class="bg-gray-700 border border-gray-600 rounded px-3 py-1 text-sm">
            </div>
            <div class="chart-container"><canvas id="history-chart"></canvas></div>
            <p id="history-summary" class="text-gray-400 text-sm mt-3"></p>
        </div>

        <div class="grid grid-cols-1 lg:grid-cols-2 gap-6">
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700">
                <div class="flex justify-between mb-4">
                    <h2 class="text-xl font-semibold">Alerts</h2>
                    <select id="alert-status" class="bg-gray-700 border border-gray-600 rounded px-3 py-1 text-sm">
                        <option value="all">All</option>
                        <option value="unresolved">Unresolved</option>
                        <option value="resolved">Resolved</option>
                    </select>
                </div>
                <div id="alert-list" class="space-y-2 text-sm"></div>
            </div>
            <div class="bg-gray-800 rounded-lg p-4 border border-gray-700">
                <h2 class="text-xl font-semibold mb-4">Notifications</h2>
                <div id="notification-list" class="space-y-2 text-sm"></div>
            </div>
        </div>
    </div>

    <script>
        let historyChart;
        let historyRequest = 0;
        const pickerTypes = { day: 'date', week: 'week', month: 'month', year: 'number' };

        async function api(url, options) {
            const response = await fetch(url, options);
            const body = await response.json();
            if (!body.success) throw new Error(body.error);
            return body.data;
        }

        async function updateStatistics() {
            try {
                const stats = await api('/api/statistics');
                document.getElementById('stat-nodes').textContent = stats.total_nodes;
                document.getElementById('stat-beekeepers').textContent = stats.active_beekeepers;
                document.getElementById('stat-alerts').textContent = stats.active_alerts;
                document.getElementById('stat-online').textContent = stats.nodes_online;
            } catch (e) { console.error('statistics', e); }
        }

        async function updateCurrent() {
            try {
                const current = await api('/api/current');
                document.getElementById('current-body').innerHTML = current.nodes.map(s => `
                    <tr class="border-t border-gray-700">
                        <td class="py-1">${s.node.id}</td><td>${s.node.name}</td><td>${s.node.kind}</td>
                        <td class="${s.online ? 'status-online' : 'status-offline'}">${s.online ? 'online' : 'offline'}</td>
                        <td>${s.temperature}</td><td>${s.humidity}</td><td>${s.weight}</td>
                    </tr>`).join('');
            } catch (e) { console.error('current', e); }
        }

        async function loadNodes() {
            const nodes = await api('/api/nodes');
            document.getElementById('history-node').innerHTML =
                nodes.map(n => `<option value="${n.id}">${n.name} (${n.id})</option>`).join('');
        }

        async function updateHistory() {
            const node = document.getElementById('history-node').value;
            const period = document.getElementById('history-period').value;
            const date = document.getElementById('history-date').value;
            const request = ++historyRequest;
            try {
                const history = await api(`/api/history?node=${node}&period=${period}&date=${encodeURIComponent(date)}`);
                // a newer selection was made while this one was in flight
                if (request !== historyRequest) return;
                const colors = ['#f59e0b', '#3b82f6', '#10b981'];
                historyChart.data.datasets = history.datasets.map((d, i) => ({
                    label: `${d.label} (${d.unit})`,
                    data: d.points,
                    borderColor: colors[i % colors.length],
                    tension: 0.3,
                    pointRadius: 2,
                }));
                historyChart.update();
                const t = history.summary.temperature;
                document.getElementById('history-summary').textContent = t
                    ? `${history.summary.sample_count} samples, temperature ${t.min.toFixed(1)} / ${t.mean.toFixed(1)} / ${t.max.toFixed(1)} °C`
                    : '';
            } catch (e) { console.error('history', e); }
        }

        async function updateAlerts() {
            const status = document.getElementById('alert-status').value;
            try {
                const alerts = await api(`/api/alerts?status=${status}`);
                document.getElementById('alert-list').innerHTML = alerts.map(a => `
                    <div class="flex items-center gap-2">
                        <span class="severity-${a.severity} px-2 rounded text-xs">${a.severity}</span>
                        <span class="flex-1">${a.node_id}: ${a.message}</span>
                        ${a.resolved ? '<span class="text-gray-500">resolved</span>'
                                     : `<button onclick="resolveAlert('${a.id}')" class="text-blue-400">Resolve</button>`}
                    </div>`).join('') || '<p class="text-gray-500">No alerts</p>';
            } catch (e) { console.error('alerts', e); }
        }

        async function resolveAlert(id) {
            await api(`/api/alerts/${id}/resolve`, { method: 'POST' });
            updateAlerts();
            updateStatistics();
        }

        async function updateNotifications() {
            try {
                const inbox = await api('/api/notifications');
                document.getElementById('unread-count').textContent = inbox.unread;
                document.getElementById('notification-list').innerHTML = inbox.notifications.slice(0, 15).map(n => `
                    <div class="${n.read ? 'text-gray-500' : ''}">
                        <span class="font-semibold">${n.title}</span> ${n.node_name}: ${n.message}
                    </div>`).join('') || '<p class="text-gray-500">Nothing new</p>';
            } catch (e) { console.error('notifications', e); }
        }

        async function markAllRead() {
            await api('/api/notifications/read', { method: 'POST' });
            updateNotifications();
        }

        document.getElementById('history-period').addEventListener('change', e => {
            const input = document.getElementById('history-date');
            input.type = pickerTypes[e.target.value];
            input.value = '';
            updateHistory();
        });
        document.getElementById('history-node').addEventListener('change', updateHistory);
        document.getElementById('history-date').addEventListener('change', updateHistory);
        document.getElementById('alert-status').addEventListener('change', updateAlerts);

        document.addEventListener('DOMContentLoaded', async () => {
            historyChart = new Chart(document.getElementById('history-chart'), {
                type: 'line',
                data: { datasets: [] },
                options: {
                    maintainAspectRatio: false,
                    scales: { x: { type: 'time' } },
                    plugins: { legend: { labels: { color: '#d1d5db' } } },
                },
            });

            await loadNodes();
            updateStatistics();
            updateCurrent();
            updateHistory();
            updateAlerts();
            updateNotifications();

            setInterval(updateCurrent, 30000);
            setInterval(updateStatistics, 30000);
            setInterval(updateNotifications, 15000);
        });
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::alerts::INBOX_CAPACITY;
    use crate::generator::{SampleRanges, ValueRange};
    use crate::metrics::{NodeKind, NotificationCategory};

    fn state() -> AppState {
        AppState::from_settings(&Settings::new().unwrap(), Some(11)).unwrap()
    }

    #[tokio::test]
    async fn test_process_tick_fills_inbox() {
        let state = state();
        let node = Node::new("node_001", "Colmena Norte", NodeKind::Hive);
        let now = Utc::now();

        let mut snapshot = LiveSnapshot::default();
        snapshot.tick(&mut StdRng::seed_from_u64(1), &SampleRanges::default(), &[node.clone()], now);
        assert_eq!(state.process_tick(&snapshot, &[node.clone()]).await, 0);

        let breaching = SampleRanges {
            temperature: ValueRange::new(41.0, 41.5),
            humidity: ValueRange::new(90.0, 91.0),
            ..SampleRanges::default()
        };
        snapshot.tick(&mut StdRng::seed_from_u64(2), &breaching, &[node.clone()], now + Duration::seconds(30));

        let raised = state.process_tick(&snapshot, &[node]).await;
        assert!(raised >= 2);
        assert_eq!(state.inbox.read().await.unread_count(), raised);
    }

    #[tokio::test]
    async fn test_process_tick_reports_weight_drop() {
        let state = state();
        let nodes = [Node::new("node_001", "Colmena Norte", NodeKind::Hive)];
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(4);

        let heavy = SampleRanges {
            weight: ValueRange::new(54.0, 55.0),
            ..SampleRanges::default()
        };
        let light = SampleRanges {
            weight: ValueRange::new(45.0, 46.0),
            ..SampleRanges::default()
        };

        let mut snapshot = LiveSnapshot::default();
        snapshot.tick(&mut rng, &heavy, &nodes, now);
        assert_eq!(state.process_tick(&snapshot, &nodes).await, 0);

        snapshot.tick(&mut rng, &light, &nodes, now + Duration::seconds(30));
        assert_eq!(state.process_tick(&snapshot, &nodes).await, 1);

        let inbox = state.inbox.read().await;
        let weight = inbox.by_category(NotificationCategory::Weight);
        assert_eq!(weight.len(), 1);
        assert_eq!(weight[0].node_id, "node_001");
    }

    #[tokio::test]
    async fn test_live_feed_delivers_notifications_until_stopped() {
        let settings = Settings::parse(
            r#"
            [ranges.temperature]
            low = 40.0
            high = 41.0

            [[nodes]]
            id = "hive-1"
            name = "Hive 1"
            kind = "hive"
            latitude = 0.0
            longitude = 0.0
            "#,
        )
        .unwrap();
        let state: SharedState = Arc::new(AppState::from_settings(&settings, Some(6)).unwrap());

        let feed = start_live_feed(&state, StdDuration::from_millis(10), Some(6));
        tokio::time::sleep(StdDuration::from_millis(60)).await;

        {
            let inbox = state.inbox.read().await;
            assert!(inbox.unread_count() > 0);
            assert!(!inbox.by_category(NotificationCategory::Temperature).is_empty());
        }

        feed.stop();
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        let stopped_at = state.inbox.read().await.len();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(state.inbox.read().await.len(), stopped_at);
        assert!(stopped_at < INBOX_CAPACITY);

        // The evaluation task released its handle on the state once the feed was gone.
        assert_eq!(Arc::strong_count(&state), 1);
    }

    #[tokio::test]
    async fn test_process_tick_respects_disabled_settings() {
        let state = state();
        let mut settings = NotificationSettings::default();
        settings.enabled = false;
        state.inbox.write().await.update_settings(settings);

        let node = Node::new("node_001", "Colmena Norte", NodeKind::Hive);
        let breaching = SampleRanges {
            temperature: ValueRange::new(50.0, 51.0),
            ..SampleRanges::default()
        };
        let mut snapshot = LiveSnapshot::default();
        snapshot.tick(&mut StdRng::seed_from_u64(3), &breaching, &[node.clone()], Utc::now());

        assert_eq!(state.process_tick(&snapshot, &[node]).await, 0);
        assert!(state.inbox.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_live_feed_populates_shared_snapshot() {
        let state: SharedState = Arc::new(state());
        let feed = start_live_feed(&state, StdDuration::from_millis(10), Some(5));

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let snapshot = state.snapshot.read().await;
        assert_eq!(snapshot.len(), state.roster.nodes().len());
        assert_eq!(snapshot.online_count(Utc::now()), 8);
        drop(snapshot);

        feed.stop();
    }
}
