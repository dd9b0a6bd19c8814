//! Crawl scheduler - the poll loop and its status transitions
//!
//! This module owns the decision of which URLs to fetch next, how many
//! fetches run concurrently, and how fast they are issued:
//! - A single scheduling task scans the work store for queued items and
//!   dispatches them until a stop signal is observed
//! - A semaphore caps the number of items in flight
//! - A dispatch gate paces submissions and absorbs rate-limit cool-downs
//! - Fetch outcomes are written back as conditional status transitions, so a
//!   stale completion can never overwrite newer state

use crate::crawler::executor::{FetchError, FetchExecutor};
use crate::crawler::gate::DispatchGate;
use crate::crawler::{CrawlMode, CrawlSettings};
use crate::storage::{SqliteStore, StorageResult, WorkStore};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;

/// Fixed intervals the poll loop runs under
///
/// These are independent of the politeness mode: the mode decides how fast
/// fetches are issued, these decide how often the store is scanned and how
/// long a throttling signal pauses dispatch.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerTiming {
    /// Maximum number of queued items picked up per scan
    pub batch_size: usize,

    /// Sleep between scans when no queued items were found
    pub idle_interval: Duration,

    /// Sleep after dispatching a batch, regardless of batch fullness
    pub rescan_interval: Duration,

    /// Global dispatch pause after a rate-limit or gateway-timeout response
    pub backoff: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            batch_size: 50,
            idle_interval: Duration::from_secs(5),
            rescan_interval: Duration::from_secs(10),
            backoff: Duration::from_secs(60),
        }
    }
}

/// Handle to the currently running poll loop
struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The crawl scheduler
///
/// Holds no item status of its own; the work store is the single source of
/// truth and the scheduler's only in-memory state is the in-flight semaphore
/// and the dispatch gate of the current run.
pub struct Scheduler {
    store: Arc<Mutex<SqliteStore>>,
    executor: Arc<dyn FetchExecutor>,
    timing: SchedulerTiming,
    control: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    /// Creates a new scheduler over the given store and executor
    pub fn new(
        store: Arc<Mutex<SqliteStore>>,
        executor: Arc<dyn FetchExecutor>,
        timing: SchedulerTiming,
    ) -> Self {
        Self {
            store,
            executor,
            timing,
            control: Mutex::new(None),
        }
    }

    /// Starts the poll loop in the given politeness mode
    ///
    /// The mode string must be one of the recognized presets; anything else
    /// is rejected without touching any state. Re-entrant: calling start
    /// while the loop is already running is a logged no-op, not an error.
    /// The shared browser resource is acquired here as a warm-up; if that
    /// fails the crawl still starts, and the executor retries acquisition on
    /// each fetch.
    pub async fn start(&self, mode: &str) -> crate::Result<()> {
        let mode = CrawlMode::parse(mode)?;
        tracing::info!("Start requested in {} mode", mode);
        self.start_with_settings(mode.settings()).await;
        Ok(())
    }

    /// Starts the poll loop under an explicit concurrency/pacing budget
    pub async fn start_with_settings(&self, settings: CrawlSettings) {
        if self.is_running() {
            tracing::info!("Scheduler already running; ignoring start request");
            return;
        }

        if let Err(e) = self.executor.prepare().await {
            // Not fatal: each fetch attempt re-acquires the resource
            tracing::warn!("Fetch resource not ready at start ({}); will retry per fetch", e);
        }

        let mut control = self.control.lock().unwrap();
        if let Some(running) = control.as_ref() {
            if !running.handle.is_finished() {
                tracing::info!("Scheduler already running; ignoring start request");
                return;
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let semaphore = Arc::new(Semaphore::new(settings.concurrency_limit));
        let gate = Arc::new(AsyncMutex::new(DispatchGate::new(
            settings.min_dispatch_interval,
        )));

        let handle = tokio::spawn(poll_loop(
            self.store.clone(),
            self.executor.clone(),
            self.timing,
            settings,
            semaphore,
            gate,
            stop_rx,
        ));

        *control = Some(RunningLoop { stop_tx, handle });
    }

    /// Stops the poll loop and reconciles in-flight work
    ///
    /// The loop is cancelled at its next suspension point; fetches already
    /// running are not preempted, but every dispatched or in-progress row is
    /// returned to queued so a later start resumes cleanly, and the late
    /// outcomes of those fetches are discarded by the conditional writes.
    /// Safe to call when not running.
    pub async fn stop(&self) {
        let running = self.control.lock().unwrap().take();

        if let Some(running) = running {
            tracing::info!("Stopping scheduler");
            let _ = running.stop_tx.send(true);
            if let Err(e) = running.handle.await {
                tracing::error!("Scheduler loop task failed: {}", e);
            }
        }

        // Reconcile even when not running: it also repairs rows left in
        // flight by a crashed process.
        let reconciled = {
            let mut store = self.store.lock().unwrap();
            store.requeue_in_flight()
        };
        match reconciled {
            Ok(0) => {}
            Ok(n) => tracing::info!("Returned {} in-flight item(s) to the queue", n),
            Err(e) => tracing::error!("Failed to reconcile in-flight items: {}", e),
        }

        self.executor.shutdown().await;
        tracing::info!("Scheduler stopped");
    }

    /// Returns true if the poll loop is currently running
    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

/// The scheduling algorithm
///
/// Repeats until stopped: scan up to a batch of queued items oldest-first,
/// dispatch each one through the semaphore and the gate, then sleep for the
/// re-scan interval (or the idle interval when nothing was queued). Every
/// sleep races against the stop signal.
async fn poll_loop(
    store: Arc<Mutex<SqliteStore>>,
    executor: Arc<dyn FetchExecutor>,
    timing: SchedulerTiming,
    settings: CrawlSettings,
    semaphore: Arc<Semaphore>,
    gate: Arc<AsyncMutex<DispatchGate>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    tracing::info!(
        concurrency = settings.concurrency_limit,
        interval_ms = settings.min_dispatch_interval.as_millis() as u64,
        "Scheduler loop started"
    );

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let batch = {
            let store = store.lock().unwrap();
            store.claim_candidates(timing.batch_size).unwrap_or_else(|e| {
                tracing::error!("Failed to scan for queued items: {}", e);
                Vec::new()
            })
        };

        if batch.is_empty() {
            if sleep_until_stopped(&mut stop_rx, timing.idle_interval).await {
                break;
            }
            continue;
        }

        tracing::debug!("Scan found {} queued item(s)", batch.len());

        for url in batch {
            if *stop_rx.borrow() {
                break;
            }

            // Concurrency cap: no permit, no dispatch. Remaining candidates
            // are picked up again on the next scan.
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Pacing: wait out the dispatch interval and any cool-down
            let mut stopped = false;
            loop {
                let wait = gate.lock().await.ready_in(Instant::now());
                match wait {
                    None => break,
                    Some(wait) => {
                        if sleep_until_stopped(&mut stop_rx, wait).await {
                            stopped = true;
                            break;
                        }
                    }
                }
            }
            if stopped {
                break;
            }

            let claimed = {
                let mut store = store.lock().unwrap();
                store.mark_dispatched(&url).unwrap_or_else(|e| {
                    tracing::error!("Failed to claim {}: {}", url, e);
                    false
                })
            };
            if !claimed {
                // The row changed underneath us (operator action); skip it
                continue;
            }

            gate.lock().await.record_dispatch(Instant::now());

            tokio::spawn(run_fetch(
                store.clone(),
                executor.clone(),
                gate.clone(),
                timing.backoff,
                url,
                permit,
            ));
        }

        if sleep_until_stopped(&mut stop_rx, timing.rescan_interval).await {
            break;
        }
    }

    tracing::info!("Scheduler loop exited");
}

/// Runs one fetch and writes its outcome back as a status transition
///
/// Transient outcomes requeue the item; rate-limit and gateway-timeout
/// signals additionally push the global cool-down. Nothing here can halt the
/// poll loop: every error is converted into a transition or a log line.
async fn run_fetch(
    store: Arc<Mutex<SqliteStore>>,
    executor: Arc<dyn FetchExecutor>,
    gate: Arc<AsyncMutex<DispatchGate>>,
    backoff: Duration,
    url: String,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let started = write_transition(&store, |s| s.mark_in_progress(&url));
    if !started {
        // stop() reconciled the row between dispatch and here
        tracing::debug!("Skipping fetch of {}: no longer dispatched", url);
        drop(permit);
        return;
    }

    tracing::info!("Fetching: {}", url);
    let outcome = executor.fetch(&url).await;

    let applied = match outcome {
        Ok(fields) => {
            tracing::info!("Scraped {} ({})", url, fields.title);
            write_transition(&store, |s| s.record_success(&url, &fields))
        }
        Err(err) if err.triggers_backoff() => {
            tracing::warn!(
                "Hit a wall fetching {} ({}); pausing dispatches for {:?}",
                url,
                err,
                backoff
            );
            gate.lock().await.push_back(Instant::now(), backoff);
            write_transition(&store, |s| s.requeue_from_flight(&url))
        }
        Err(FetchError::ConnectionReset(reason)) => {
            tracing::warn!(
                "Browser channel dropped while fetching {} ({}); requeueing",
                url,
                reason
            );
            write_transition(&store, |s| s.requeue_from_flight(&url))
        }
        Err(err) => {
            tracing::error!("Fetch of {} failed: {}", url, err);
            let message = err.to_string();
            write_transition(&store, |s| s.record_failure(&url, &message))
        }
    };

    if !applied {
        tracing::debug!("Discarded stale outcome for {}: row was reconciled", url);
    }

    drop(permit);
}

/// Applies a conditional store write, reporting whether a row changed
fn write_transition<F>(store: &Arc<Mutex<SqliteStore>>, transition: F) -> bool
where
    F: FnOnce(&mut SqliteStore) -> StorageResult<bool>,
{
    let mut store = store.lock().unwrap();
    match transition(&mut store) {
        Ok(applied) => applied,
        Err(e) => {
            tracing::error!("Failed to record status transition: {}", e);
            false
        }
    }
}

/// Sleeps for `duration` unless the stop signal fires first
///
/// # Returns
///
/// true if the loop should stop
async fn sleep_until_stopped(stop_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => *stop_rx.borrow(),
        changed = stop_rx.changed() => changed.is_err() || *stop_rx.borrow(),
    }
}
