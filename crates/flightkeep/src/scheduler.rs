//! Periodic auto-save.
//!
//! An [`AutoSaver`] owns one timer task on the ambient tokio runtime. Each
//! tick asks the host for its current flight list and persists it through the
//! guarded write path, so a timer tick can never wipe stored flights.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::durability::{DurabilityManager, PersistOutcome};
use crate::error::{Error, Result};
use crate::record::FlightRecord;

/// Supplies the host's current flight list on each tick.
pub type SnapshotProvider = Arc<dyn Fn() -> Vec<FlightRecord> + Send + Sync>;

/// Tick counters shared with the timer task.
#[derive(Debug, Default)]
struct Counters {
    saves: AtomicU64,
    skipped: AtomicU64,
}

/// Status of an auto-saver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveStatus {
    /// Whether the timer is currently armed.
    pub is_running: bool,

    /// Time between saves.
    pub interval: Duration,

    /// Ticks that saved the flight list.
    pub saves: u64,

    /// Ticks that were refused or failed.
    pub skipped: u64,
}

impl std::fmt::Display for AutoSaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_running { "running" } else { "stopped" };
        write!(
            f,
            "auto-save {state} every {}ms ({} saved, {} skipped)",
            self.interval.as_millis(),
            self.saves,
            self.skipped
        )
    }
}

/// Owns the periodic save timer.
///
/// At most one timer is armed per `AutoSaver`. Dropping it cancels the timer
/// without a final save; use [`AutoSaver::shutdown`] for that.
pub struct AutoSaver {
    manager: Arc<DurabilityManager>,
    interval: Duration,
    provider: Option<SnapshotProvider>,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for AutoSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaver")
            .field("interval", &self.interval)
            .field("is_running", &self.is_running())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl AutoSaver {
    /// Create a stopped auto-saver that will save every `interval`.
    #[must_use]
    pub fn new(manager: Arc<DurabilityManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            provider: None,
            task: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Arm the timer. Any timer already armed is cancelled first, so calling
    /// this twice leaves exactly one running.
    ///
    /// The first save happens one interval after this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchedulerStart`] if called outside a tokio runtime or
    /// with a zero interval.
    pub fn start<F>(&mut self, provider: F) -> Result<()>
    where
        F: Fn() -> Vec<FlightRecord> + Send + Sync + 'static,
    {
        if self.interval.is_zero() {
            return Err(Error::scheduler_start("interval must be greater than zero"));
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::scheduler_start(format!("no async runtime: {e}")))?;

        self.stop();

        let provider: SnapshotProvider = Arc::new(provider);
        self.provider = Some(Arc::clone(&provider));

        let manager = Arc::clone(&self.manager);
        let counters = Arc::clone(&self.counters);
        let period = self.interval;
        let first_tick = Instant::now() + period;

        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let records = provider();
                match manager.persist(&records, false) {
                    PersistOutcome::Saved { count, .. } => {
                        counters.saves.fetch_add(1, Ordering::Relaxed);
                        debug!(count, "Auto-save tick stored flights");
                    }
                    outcome => {
                        counters.skipped.fetch_add(1, Ordering::Relaxed);
                        debug!(%outcome, "Auto-save tick did not store flights");
                    }
                }
            }
        }));

        info!(
            interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Auto-save started"
        );
        Ok(())
    }

    /// Cancel the timer. Does nothing if no timer is armed.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Auto-save stopped");
        }
    }

    /// Check if the timer is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Number of ticks that saved the flight list.
    #[must_use]
    pub fn saves_completed(&self) -> u64 {
        self.counters.saves.load(Ordering::Relaxed)
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AutoSaveStatus {
        AutoSaveStatus {
            is_running: self.is_running(),
            interval: self.interval,
            saves: self.counters.saves.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Stop the timer and flush the latest snapshot once.
    ///
    /// `user_emptied` is passed to [`DurabilityManager::force_flush`]. Returns
    /// `None` if the saver was never started.
    pub fn shutdown(mut self, user_emptied: bool) -> Option<PersistOutcome> {
        self.stop();
        let provider = self.provider.take()?;
        let outcome = self.manager.force_flush(&provider(), user_emptied);
        info!(%outcome, "Final flush on shutdown");
        Some(outcome)
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::durability::test_support::{flights, ids, memory_manager};
    use crate::store::KeyValueStore;

    const PERIOD: Duration = Duration::from_millis(5_000);

    fn shared(records: Vec<FlightRecord>) -> Arc<Mutex<Vec<FlightRecord>>> {
        Arc::new(Mutex::new(records))
    }

    fn provider_for(
        state: &Arc<Mutex<Vec<FlightRecord>>>,
    ) -> impl Fn() -> Vec<FlightRecord> + Send + Sync + 'static {
        let state = Arc::clone(state);
        move || state.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_on_each_interval() {
        let (store, manager) = memory_manager();
        let state = shared(flights(2));
        let mut saver = AutoSaver::new(Arc::new(manager), PERIOD);
        saver.start(provider_for(&state)).unwrap();
        assert!(saver.is_running());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(saver.saves_completed(), 0);
        assert!(store.get("milavia_flights_primary").unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(saver.saves_completed(), 1);

        state.lock().unwrap().extend(flights(3).into_iter().skip(2));
        tokio::time::sleep(PERIOD).await;
        assert_eq!(saver.saves_completed(), 2);

        let recovered = saver.manager.recover();
        assert_eq!(ids(&recovered.flights), vec!["f1", "f2", "f3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_one_timer() {
        let (_store, manager) = memory_manager();
        let state = shared(flights(1));
        let mut saver = AutoSaver::new(Arc::new(manager), PERIOD);

        saver.start(provider_for(&state)).unwrap();
        saver.start(provider_for(&state)).unwrap();

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(saver.saves_completed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let (_store, manager) = memory_manager();
        let state = shared(flights(1));
        let mut saver = AutoSaver::new(Arc::new(manager), PERIOD);

        saver.stop();
        saver.start(provider_for(&state)).unwrap();
        saver.stop();
        saver.stop();
        assert!(!saver.is_running());

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(saver.saves_completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tick_never_wipes() {
        let (store, manager) = memory_manager();
        assert!(manager.persist(&flights(4), false).is_saved());
        let state = shared(Vec::new());
        let mut saver = AutoSaver::new(Arc::new(manager), PERIOD);
        saver.start(provider_for(&state)).unwrap();

        tokio::time::sleep(Duration::from_millis(5_100)).await;

        let status = saver.status();
        assert_eq!(status.saves, 0);
        assert_eq!(status.skipped, 1);
        let primary = store.get("milavia_flights_primary").unwrap().unwrap();
        assert!(primary.contains("\"f4\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_latest_snapshot() {
        let (_store, manager) = memory_manager();
        let manager = Arc::new(manager);
        let state = shared(flights(2));
        let mut saver = AutoSaver::new(Arc::clone(&manager), PERIOD);
        saver.start(provider_for(&state)).unwrap();

        *state.lock().unwrap() = flights(3);
        let outcome = saver.shutdown(false).unwrap();

        assert!(outcome.is_saved());
        assert_eq!(manager.recover().flights.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_user_emptied_forces_empty_write() {
        let (_store, manager) = memory_manager();
        let manager = Arc::new(manager);
        assert!(manager.persist(&flights(2), false).is_saved());
        let state = shared(Vec::new());
        let mut saver = AutoSaver::new(Arc::clone(&manager), PERIOD);
        saver.start(provider_for(&state)).unwrap();

        let outcome = saver.shutdown(true).unwrap();

        assert!(outcome.is_saved());
        assert!(manager.recover().flights.is_empty());
    }

    #[test]
    fn test_shutdown_without_start() {
        let (_store, manager) = memory_manager();
        let saver = AutoSaver::new(Arc::new(manager), PERIOD);
        assert!(saver.shutdown(false).is_none());
    }

    #[test]
    fn test_start_outside_runtime() {
        let (_store, manager) = memory_manager();
        let mut saver = AutoSaver::new(Arc::new(manager), PERIOD);
        let err = saver.start(Vec::new).unwrap_err();
        assert!(matches!(err, Error::SchedulerStart { .. }));
        assert!(!saver.is_running());
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (_store, manager) = memory_manager();
        let mut saver = AutoSaver::new(Arc::new(manager), Duration::ZERO);
        assert!(saver.start(Vec::new).is_err());
    }

    #[test]
    fn test_status_display() {
        let status = AutoSaveStatus {
            is_running: true,
            interval: PERIOD,
            saves: 3,
            skipped: 1,
        };
        assert_eq!(
            status.to_string(),
            "auto-save running every 5000ms (3 saved, 1 skipped)"
        );
    }
}
