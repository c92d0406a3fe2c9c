//! Poll scheduling and request dispatch.
//!
//! A [`Scheduler`] task emits poll requests on a fixed interval into a
//! capacity-1 channel. Callers submit pushes through a [`SyncHandle`]. A
//! single [`Dispatcher`] drains both channels and runs one request at a
//! time on the blocking pool, so station work never overlaps.

use crate::error::{SyncError, SyncResult};
use crate::monitor::MonitorStation;
use crate::patient::PatientStation;
use crate::transport::StoreTransport;
use sleeplab_protocol::{CpapPressure, PatientUpsert, UpsertAck};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Pushes waiting for the dispatcher.
const PUSH_QUEUE_CAPACITY: usize = 16;

/// Anything the dispatcher can drive.
///
/// Both methods block on the transport and run on the blocking pool.
pub trait Station: Send + Sync + 'static {
    /// User-triggered write.
    type Push: Send + 'static;
    /// Result of a successful push.
    type Ack: Send + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Refreshes the station's cache from the store.
    fn run_poll(&self) -> SyncResult<()>;

    /// Sends one user write to the store.
    fn run_push(&self, request: Self::Push) -> SyncResult<Self::Ack>;
}

impl<T: StoreTransport + 'static> Station for PatientStation<T> {
    type Push = PatientUpsert;
    type Ack = UpsertAck;

    fn name(&self) -> &'static str {
        "patient"
    }

    fn run_poll(&self) -> SyncResult<()> {
        self.poll().map(|_| ())
    }

    fn run_push(&self, request: PatientUpsert) -> SyncResult<UpsertAck> {
        self.upload(request)
    }
}

impl<T: StoreTransport + 'static> Station for MonitorStation<T> {
    type Push = i64;
    type Ack = CpapPressure;

    fn name(&self) -> &'static str {
        "monitor"
    }

    fn run_poll(&self) -> SyncResult<()> {
        self.poll()
    }

    fn run_push(&self, cpap_pressure: i64) -> SyncResult<CpapPressure> {
        self.set_cpap_pressure(cpap_pressure)
    }
}

/// A unit of work for the dispatcher.
pub enum SyncRequest<S: Station> {
    /// Periodic refresh.
    Poll {
        /// Tick number, starting at 1.
        tick: u64,
    },
    /// User write with a reply slot.
    Push {
        /// The write.
        request: S::Push,
        /// Receives the outcome.
        reply: oneshot::Sender<SyncResult<S::Ack>>,
    },
}

impl<S: Station> fmt::Debug for SyncRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncRequest::Poll { tick } => f.debug_struct("Poll").field("tick", tick).finish(),
            SyncRequest::Push { .. } => f.debug_struct("Push").finish_non_exhaustive(),
        }
    }
}

/// Counters reported when the dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Polls that succeeded.
    pub polls_completed: u64,
    /// Polls that failed and were dropped.
    pub polls_failed: u64,
    /// Ticks skipped because a poll was still queued.
    pub polls_skipped: u64,
    /// Pushes that succeeded.
    pub pushes_completed: u64,
    /// Pushes that failed.
    pub pushes_failed: u64,
}

/// Emits poll requests on a fixed interval.
pub struct Scheduler<S: Station> {
    interval: Duration,
    polls: mpsc::Sender<SyncRequest<S>>,
    shutdown: watch::Receiver<bool>,
}

impl<S: Station> Scheduler<S> {
    /// Creates a scheduler feeding `polls`.
    pub fn new(
        interval: Duration,
        polls: mpsc::Sender<SyncRequest<S>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            interval,
            polls,
            shutdown,
        }
    }

    /// Runs until shutdown. Returns the number of skipped ticks.
    ///
    /// The first poll is emitted immediately.
    pub async fn run(mut self) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick = 0u64;
        let mut skipped = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick += 1;
                    match self.polls.try_send(SyncRequest::Poll { tick }) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            skipped += 1;
                            debug!(tick, "previous poll still queued, skipping tick");
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                _ = self.shutdown.changed() => break,
            }
        }
        skipped
    }
}

/// Executes requests one at a time.
pub struct Dispatcher<S: Station> {
    station: Arc<S>,
    polls: mpsc::Receiver<SyncRequest<S>>,
    pushes: mpsc::Receiver<SyncRequest<S>>,
    shutdown: watch::Receiver<bool>,
    stats: DispatchStats,
}

impl<S: Station> Dispatcher<S> {
    /// Creates a dispatcher for `station`.
    pub fn new(
        station: Arc<S>,
        polls: mpsc::Receiver<SyncRequest<S>>,
        pushes: mpsc::Receiver<SyncRequest<S>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            station,
            polls,
            pushes,
            shutdown,
            stats: DispatchStats::default(),
        }
    }

    /// Runs until shutdown or until both channels close.
    ///
    /// Pushes are taken before polls. Pending pushes left at shutdown are
    /// dropped and their callers see [`SyncError::Shutdown`].
    pub async fn run(mut self) -> DispatchStats {
        loop {
            let request = tokio::select! {
                biased;
                Some(request) = self.pushes.recv() => request,
                Some(request) = self.polls.recv() => request,
                _ = self.shutdown.changed() => break,
                else => break,
            };
            self.execute(request).await;
        }
        info!(station = self.station.name(), stats = ?self.stats, "dispatcher stopped");
        self.stats
    }

    async fn execute(&mut self, request: SyncRequest<S>) {
        let station = Arc::clone(&self.station);
        let name = station.name();

        match request {
            SyncRequest::Poll { tick } => {
                match tokio::task::spawn_blocking(move || station.run_poll()).await {
                    Ok(Ok(())) => {
                        self.stats.polls_completed += 1;
                        debug!(station = name, tick, "poll complete");
                    }
                    Ok(Err(err)) => {
                        self.stats.polls_failed += 1;
                        warn!(station = name, tick, error = %err, "poll failed, waiting for next tick");
                    }
                    Err(err) => {
                        self.stats.polls_failed += 1;
                        warn!(station = name, tick, error = %err, "poll task aborted");
                    }
                }
            }
            SyncRequest::Push { request, reply } => {
                let result = tokio::task::spawn_blocking(move || station.run_push(request))
                    .await
                    .unwrap_or_else(|e| Err(SyncError::Internal(format!("push task aborted: {}", e))));
                if result.is_ok() {
                    self.stats.pushes_completed += 1;
                } else {
                    self.stats.pushes_failed += 1;
                }
                if reply.send(result).is_err() {
                    debug!(station = name, "push caller went away");
                }
            }
        }
    }
}

/// Submits pushes to a running dispatcher.
pub struct SyncHandle<S: Station> {
    pushes: mpsc::Sender<SyncRequest<S>>,
}

impl<S: Station> Clone for SyncHandle<S> {
    fn clone(&self) -> Self {
        Self {
            pushes: self.pushes.clone(),
        }
    }
}

impl<S: Station> SyncHandle<S> {
    /// Queues a push and waits for its outcome.
    pub async fn push(&self, request: S::Push) -> SyncResult<S::Ack> {
        let (reply, outcome) = oneshot::channel();
        self.pushes
            .send(SyncRequest::Push { request, reply })
            .await
            .map_err(|_| SyncError::Shutdown)?;
        outcome.await.map_err(|_| SyncError::Shutdown)?
    }
}

/// A running scheduler and dispatcher pair for one station.
pub struct SyncService<S: Station> {
    station: Arc<S>,
    handle: SyncHandle<S>,
    shutdown: watch::Sender<bool>,
    scheduler: JoinHandle<u64>,
    dispatcher: JoinHandle<DispatchStats>,
}

impl<S: Station> SyncService<S> {
    /// Starts polling `station` every `poll_interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(station: Arc<S>, poll_interval: Duration) -> Self {
        let (poll_tx, poll_rx) = mpsc::channel(1);
        let (push_tx, push_rx) = mpsc::channel(PUSH_QUEUE_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let scheduler = Scheduler::new(poll_interval, poll_tx, shutdown_rx.clone());
        let dispatcher = Dispatcher::new(Arc::clone(&station), poll_rx, push_rx, shutdown_rx);
        info!(station = station.name(), ?poll_interval, "sync service started");

        Self {
            station,
            handle: SyncHandle { pushes: push_tx },
            shutdown,
            scheduler: tokio::spawn(scheduler.run()),
            dispatcher: tokio::spawn(dispatcher.run()),
        }
    }

    /// Returns the driven station.
    pub fn station(&self) -> &Arc<S> {
        &self.station
    }

    /// Returns a handle for submitting pushes.
    pub fn handle(&self) -> SyncHandle<S> {
        self.handle.clone()
    }

    /// Queues a push and waits for its outcome.
    pub async fn push(&self, request: S::Push) -> SyncResult<S::Ack> {
        self.handle.push(request).await
    }

    /// Stops both tasks and returns the dispatcher's counters.
    pub async fn shutdown(self) -> DispatchStats {
        // Both tasks may have exited already.
        let _ = self.shutdown.send(true);
        let skipped = self.scheduler.await.unwrap_or_default();
        let mut stats = self.dispatcher.await.unwrap_or_default();
        stats.polls_skipped = skipped;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestStation {
        polls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_polls: AtomicBool,
        poll_delay: Duration,
    }

    impl TestStation {
        fn slow(delay: Duration) -> Self {
            Self {
                poll_delay: delay,
                ..Self::default()
            }
        }

        fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Station for TestStation {
        type Push = i64;
        type Ack = i64;

        fn name(&self) -> &'static str {
            "test"
        }

        fn run_poll(&self) -> SyncResult<()> {
            self.enter();
            std::thread::sleep(self.poll_delay);
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.leave();
            if self.fail_polls.load(Ordering::SeqCst) {
                Err(SyncError::transport_retryable("store unreachable"))
            } else {
                Ok(())
            }
        }

        fn run_push(&self, request: i64) -> SyncResult<i64> {
            self.enter();
            self.leave();
            if request < 0 {
                Err(SyncError::Validation("negative".into()))
            } else {
                Ok(request * 2)
            }
        }
    }

    #[tokio::test]
    async fn polls_run_on_interval() {
        let station = Arc::new(TestStation::default());
        let service = SyncService::spawn(Arc::clone(&station), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(75)).await;
        let stats = service.shutdown().await;

        assert!(stats.polls_completed >= 3, "{:?}", stats);
        assert_eq!(stats.polls_failed, 0);
        assert_eq!(station.polls.load(Ordering::SeqCst) as u64, stats.polls_completed);
    }

    #[tokio::test]
    async fn push_result_returned_to_caller() {
        let station = Arc::new(TestStation::default());
        let service = SyncService::spawn(station, Duration::from_secs(30));

        assert_eq!(service.push(21).await.unwrap(), 42);
        assert!(matches!(service.push(-1).await, Err(SyncError::Validation(_))));

        let stats = service.shutdown().await;
        assert_eq!(stats.pushes_completed, 1);
        assert_eq!(stats.pushes_failed, 1);
    }

    #[tokio::test]
    async fn poll_errors_are_suppressed() {
        let station = Arc::new(TestStation::default());
        station.fail_polls.store(true, Ordering::SeqCst);
        let service = SyncService::spawn(Arc::clone(&station), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(service.push(1).await.unwrap(), 2);
        let stats = service.shutdown().await;

        assert!(stats.polls_failed >= 2, "{:?}", stats);
        assert_eq!(stats.polls_completed, 0);
        assert_eq!(stats.pushes_completed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_polls_never_overlap() {
        let station = Arc::new(TestStation::slow(Duration::from_millis(20)));
        let service = SyncService::spawn(Arc::clone(&station), Duration::from_millis(5));
        let handle = service.handle();

        for value in 0..5 {
            handle.push(value).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stats = service.shutdown().await;

        assert_eq!(station.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(stats.polls_skipped > 0, "{:?}", stats);
        assert_eq!(stats.pushes_completed, 5);
    }

    #[tokio::test]
    async fn push_after_shutdown_fails() {
        let station = Arc::new(TestStation::default());
        let service = SyncService::spawn(station, Duration::from_secs(30));
        let handle = service.handle();
        service.shutdown().await;

        assert!(matches!(handle.push(1).await, Err(SyncError::Shutdown)));
    }

    #[test]
    fn request_debug_hides_reply() {
        let (reply, _rx) = oneshot::channel();
        let push: SyncRequest<TestStation> = SyncRequest::Push { request: 3, reply };
        assert_eq!(format!("{:?}", push), "Push { .. }");
        let poll: SyncRequest<TestStation> = SyncRequest::Poll { tick: 4 };
        assert_eq!(format!("{:?}", poll), "Poll { tick: 4 }");
    }
}
