//! Live "current value" surface.
//!
//! Every tick draws one fresh reading per roster node and replaces the
//! previous snapshot wholesale. The reading it replaced is kept per node so
//! delta checks (weight loss) have something to compare against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use crate::generator::SampleRanges;
use crate::metrics::{Node, Reading};
use crate::roster::RosterProvider;

pub const DEFAULT_REFRESH_INTERVAL: StdDuration = StdDuration::from_secs(30);
pub const DEFAULT_ONLINE_WINDOW_SECS: i64 = 5 * 60;

pub type SharedSnapshot = Arc<RwLock<LiveSnapshot>>;

#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    current: HashMap<String, Reading>,
    previous: HashMap<String, Reading>,
    online_window: Duration,
    ticks: u64,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_ONLINE_WINDOW_SECS))
    }
}

impl LiveSnapshot {
    pub fn new(online_window: Duration) -> Self {
        Self {
            current: HashMap::new(),
            previous: HashMap::new(),
            online_window,
            ticks: 0,
        }
    }

    /// Regenerates the whole snapshot for `roster`, stamping every reading with `now`.
    pub fn tick<R: Rng>(&mut self, rng: &mut R, ranges: &SampleRanges, roster: &[Node], now: DateTime<Utc>) {
        let mut last = std::mem::take(&mut self.current);
        let mut current = HashMap::with_capacity(roster.len());
        let mut previous = HashMap::new();

        for node in roster {
            current.insert(node.id.clone(), ranges.sample(rng, node, now));
            if let Some(reading) = last.remove(&node.id) {
                previous.insert(node.id.clone(), reading);
            }
        }

        self.current = current;
        self.previous = previous;
        self.ticks += 1;
    }

    pub fn current(&self, node_id: &str) -> Option<&Reading> {
        self.current.get(node_id)
    }

    /// Reading replaced by the most recent tick
    pub fn previous(&self, node_id: &str) -> Option<&Reading> {
        self.previous.get(node_id)
    }

    pub fn readings(&self) -> &HashMap<String, Reading> {
        &self.current
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn online_window(&self) -> Duration {
        self.online_window
    }

    /// A node is online while its reading is younger than the online window.
    pub fn is_online(&self, node_id: &str, now: DateTime<Utc>) -> bool {
        self.current
            .get(node_id)
            .map(|reading| now - reading.timestamp < self.online_window)
            .unwrap_or(false)
    }

    pub fn online_count(&self, now: DateTime<Utc>) -> usize {
        self.current
            .values()
            .filter(|reading| now - reading.timestamp < self.online_window)
            .count()
    }
}

/// Background task refreshing a [`SharedSnapshot`] on a fixed cadence.
///
/// The first refresh happens immediately. Dropping the handle stops the task.
pub struct LiveFeed {
    handle: JoinHandle<()>,
}

impl LiveFeed {
    pub fn spawn<F>(
        roster: Arc<dyn RosterProvider>,
        ranges: SampleRanges,
        refresh: StdDuration,
        seed: Option<u64>,
        state: SharedSnapshot,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut(&LiveSnapshot, &[Node]) + Send + 'static,
    {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let handle = tokio::spawn(async move {
            info!("Starting live feed with {:?} refresh", refresh);
            let mut interval = time::interval(refresh);

            loop {
                interval.tick().await;

                let nodes = roster.nodes();
                let now = Utc::now();
                let mut snapshot = state.write().await;
                snapshot.tick(&mut rng, &ranges, &nodes, now);

                log_snapshot_summary(&snapshot, &nodes);
                on_tick(&snapshot, &nodes);
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        debug!("Stopping live feed");
        self.handle.abort();
    }
}

fn log_snapshot_summary(snapshot: &LiveSnapshot, nodes: &[Node]) {
    debug!(tick = snapshot.ticks(), nodes = nodes.len(), "Live snapshot refreshed");

    for node in nodes {
        if let Some(reading) = snapshot.current(&node.id) {
            debug!(
                node = %node.id,
                temperature = %reading.temperature_label(),
                humidity = %reading.humidity_label(),
                weight = %reading.weight_label(),
                "Reading"
            );
        }
    }
}
