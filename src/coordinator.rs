use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, Notify, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, warn};

use crate::client::ProAirClient;
use crate::diff::diff_snapshots;
use crate::error::ErrorCategory;
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Shorter intervals passed to the builder are raised to this.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&ControlUnit) + Send + Sync>;

/// Where the coordinator is in its refresh cycle.
///
/// `Idle -> Fetching -> Merging -> Idle` on success. A failed cycle ends in
/// `Failed`, which lasts until the next cycle starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    Merging,
    Failed,
}

pub struct RefreshCoordinatorBuilder {
    client: ProAirClient,
    interval: Duration,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl RefreshCoordinatorBuilder {
    pub fn new(client: ProAirClient) -> Self {
        Self {
            client,
            interval: DEFAULT_REFRESH_INTERVAL,
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        if interval < MIN_REFRESH_INTERVAL {
            warn!(?interval, min = ?MIN_REFRESH_INTERVAL, "refresh interval too short, clamping");
        }
        self.interval = interval.max(MIN_REFRESH_INTERVAL);
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&ControlUnit) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> RefreshCoordinator {
        let (snapshot, _) = watch::channel(None);
        let (state, _) = watch::channel(RefreshState::Idle);
        let (last_failure, _) = watch::channel(None);
        RefreshCoordinator {
            client: Mutex::new(self.client),
            interval: self.interval,
            snapshot,
            state,
            last_failure,
            refresh_requested: Notify::new(),
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
        }
    }
}

/// Keeps a published [`ControlUnit`] snapshot current.
///
/// Each cycle reads the full status, then every zone's detail one at a time.
/// A failed zone detail keeps that zone's coarse record; a failed full status
/// fails the cycle and leaves the previous snapshot in place. Snapshots are
/// replaced whole, never edited.
///
/// The client sits behind a mutex: a refresh cycle or a command holds the
/// device for its whole duration, so there is one writer per unit.
pub struct RefreshCoordinator {
    client: Mutex<ProAirClient>,
    interval: Duration,
    snapshot: watch::Sender<Option<Arc<ControlUnit>>>,
    state: watch::Sender<RefreshState>,
    last_failure: watch::Sender<Option<ErrorCategory>>,
    refresh_requested: Notify,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl RefreshCoordinator {
    pub fn builder(client: ProAirClient) -> RefreshCoordinatorBuilder {
        RefreshCoordinatorBuilder::new(client)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Latest published snapshot, if any cycle has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<ControlUnit>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ControlUnit>>> {
        self.snapshot.subscribe()
    }

    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Category of the most recent failed cycle; cleared by a successful one.
    pub fn last_failure(&self) -> Option<ErrorCategory> {
        *self.last_failure.borrow()
    }

    /// Exclusive access to the client, waiting for any cycle in progress.
    pub async fn client(&self) -> MutexGuard<'_, ProAirClient> {
        self.client.lock().await
    }

    /// Checks the PIN, keeping the failure detail for the caller.
    pub async fn validate(&self) -> Result<()> {
        self.client.lock().await.verify_credential().await
    }

    /// Runs one facade mutation with exclusive access to the device and asks
    /// the run loop for a refresh once it succeeds.
    pub async fn command<T>(
        &self,
        f: impl AsyncFnOnce(&mut ProAirClient) -> Result<T>,
    ) -> Result<T> {
        let result = {
            let mut client = self.client.lock().await;
            f(&mut *client).await
        };
        if result.is_ok() {
            self.request_refresh();
        }
        result
    }

    /// Wakes the run loop for an immediate refresh. Requests made while no
    /// loop is waiting are remembered (one at most).
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    /// One refresh cycle: full status, then per-zone detail, then publish.
    pub async fn refresh(&self) -> Result<Arc<ControlUnit>> {
        let mut client = self.client.lock().await;
        self.set_state(RefreshState::Fetching);

        let coarse = match client.fetch_status().await {
            Ok(cu) => cu,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(RefreshState::Merging);
        let mut zones = Vec::with_capacity(coarse.zones.len());
        for zone in &coarse.zones {
            match client.fetch_zone_status(zone.id).await {
                Ok(detailed) if detailed.id == zone.id => zones.push(detailed),
                Ok(detailed) => {
                    warn!(
                        zone_id = zone.id,
                        received = detailed.id,
                        "zone detail mismatched, keeping coarse data"
                    );
                    zones.push(zone.clone());
                }
                Err(e) => {
                    warn!(zone_id = zone.id, error = %e, "zone detail failed, keeping coarse data");
                    zones.push(zone.clone());
                }
            }
        }
        drop(client);

        let merged = Arc::new(ControlUnit { zones, ..coarse });
        self.publish(merged.clone());
        self.last_failure.send_replace(None);
        self.set_state(RefreshState::Idle);
        Ok(merged)
    }

    /// Refreshes every interval and whenever [`Self::request_refresh`] is
    /// called. Transient failures are logged and polling continues with the
    /// last snapshot; auth and compatibility failures end the loop, since
    /// retrying cannot fix them.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.refresh_requested.notified() => {
                    debug!("on-demand refresh");
                    ticker.reset();
                }
            }

            if let Err(e) = self.refresh().await
                && !e.category().is_retryable()
            {
                return Err(e);
            }
        }
    }

    fn set_state(&self, state: RefreshState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "refresh state");
        }
    }

    fn fail(&self, e: Error) -> Error {
        let category = e.category();
        match category {
            ErrorCategory::Auth => error!(error = %e, "PIN rejected, reconfiguration required"),
            ErrorCategory::Incompatible => error!(error = %e, "unit rejected the status request"),
            _ => warn!(error = %e, "refresh failed, keeping previous snapshot"),
        }
        self.last_failure.send_replace(Some(category));
        self.set_state(RefreshState::Failed);
        e
    }

    fn publish(&self, snapshot: Arc<ControlUnit>) {
        let previous = self.snapshot.send_replace(Some(snapshot.clone()));
        let events = diff_snapshots(previous.as_deref(), &snapshot);

        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        for cb in &self.snapshot_callbacks {
            cb(&snapshot);
        }

        if !events.is_empty() {
            debug!(count = events.len(), "published snapshot with changes");
        }
    }
}
