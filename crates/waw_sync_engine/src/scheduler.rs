//! Periodic, failure-isolated execution of the reconcilers.

use crate::config::SyncConfig;
use crate::model::{ModelOutcome, ModelReconciler};
use crate::profile::{ProfileOutcome, ProfileReconciler};
use crate::transport::{RemoteModelClient, RemoteProfileClient};
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use waw_profile_store::ProfileStore;

/// An outcome the scheduler can log and count.
pub trait CycleOutcome: fmt::Display {
    /// Returns true if the cycle should count as failed.
    fn is_failure(&self) -> bool;
}

impl CycleOutcome for ProfileOutcome {
    fn is_failure(&self) -> bool {
        ProfileOutcome::is_failure(self)
    }
}

impl CycleOutcome for ModelOutcome {
    fn is_failure(&self) -> bool {
        ModelOutcome::is_failure(self)
    }
}

/// A unit of periodic work.
///
/// `reconcile` runs on the blocking thread pool and may block for as long
/// as its own timeouts allow.
pub trait Reconcile: Send + Sync + 'static {
    /// Outcome of one cycle.
    type Outcome: CycleOutcome + Send + 'static;

    /// Name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Runs one cycle.
    fn reconcile(&self) -> Self::Outcome;

    /// Asks an in-flight cycle to stop early.
    fn cancel(&self) {}

    /// Clears a previous cancellation.
    fn reset_cancel(&self) {}
}

impl<S, C> Reconcile for ProfileReconciler<S, C>
where
    S: ProfileStore + 'static,
    C: RemoteProfileClient + 'static,
{
    type Outcome = ProfileOutcome;

    fn name(&self) -> &'static str {
        "profile"
    }

    fn reconcile(&self) -> ProfileOutcome {
        ProfileReconciler::reconcile(self)
    }
}

impl<C: RemoteModelClient + 'static> Reconcile for ModelReconciler<C> {
    type Outcome = ModelOutcome;

    fn name(&self) -> &'static str {
        "model"
    }

    fn reconcile(&self) -> ModelOutcome {
        ModelReconciler::reconcile(self)
    }

    fn cancel(&self) {
        ModelReconciler::cancel(self);
    }

    fn reset_cancel(&self) {
        ModelReconciler::reset_cancel(self);
    }
}

/// Counters for one reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    /// Completed cycles, including failed and panicked ones.
    pub runs: u64,
    /// Cycles whose outcome was a failure.
    pub failures: u64,
    /// Cycles that panicked.
    pub panics: u64,
    /// Display text of the last outcome.
    pub last_outcome: Option<String>,
    /// When the last cycle finished.
    pub last_run: Option<SystemTime>,
}

impl ReconcilerStats {
    fn record(&mut self, outcome: String, failed: bool, panicked: bool) {
        self.runs += 1;
        if failed {
            self.failures += 1;
        }
        if panicked {
            self.panics += 1;
        }
        self.last_outcome = Some(outcome);
        self.last_run = Some(SystemTime::now());
    }
}

/// Statistics for both reconcilers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Profile reconciler counters.
    pub profile: ReconcilerStats,
    /// Model reconciler counters.
    pub model: ReconcilerStats,
}

/// Runs a profile and a model reconciler on independent fixed periods.
///
/// Each reconciler gets its own task and timer. A failing outcome or a
/// panic is logged and counted, and the task keeps ticking; the other task
/// is never affected. A cycle that overruns its period delays the next tick
/// instead of triggering a burst.
///
/// The caller keeps its own `Arc`s to the reconcilers. Reconcilers built on
/// blocking HTTP clients must be dropped outside the runtime.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use waw_sync_engine::*;
/// # async fn demo<P: Reconcile, M: Reconcile>(profile: Arc<P>, model: Arc<M>) {
/// let handle = SyncScheduler::new(profile, model).start();
/// // ...
/// let stats = handle.stop().await;
/// # }
/// ```
pub struct SyncScheduler<P, M> {
    profile: Arc<P>,
    model: Arc<M>,
    profile_interval: Duration,
    model_interval: Duration,
    shutdown_grace: Duration,
}

impl<P: Reconcile, M: Reconcile> SyncScheduler<P, M> {
    /// Creates a scheduler with the default periods (60 s and 300 s).
    pub fn new(profile: Arc<P>, model: Arc<M>) -> Self {
        Self {
            profile,
            model,
            profile_interval: Duration::from_secs(60),
            model_interval: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(10),
        }
    }

    /// Creates a scheduler using the periods in `config`.
    pub fn from_config(profile: Arc<P>, model: Arc<M>, config: &SyncConfig) -> Self {
        Self::new(profile, model)
            .with_profile_interval(config.profile_interval)
            .with_model_interval(config.model_interval)
            .with_shutdown_grace(config.shutdown_grace)
    }

    /// Sets the profile period. A zero period is raised to 1 ms.
    pub fn with_profile_interval(mut self, interval: Duration) -> Self {
        self.profile_interval = usable_interval("profile", interval);
        self
    }

    /// Sets the model period. A zero period is raised to 1 ms.
    pub fn with_model_interval(mut self, interval: Duration) -> Self {
        self.model_interval = usable_interval("model", interval);
        self
    }

    /// Sets how long [`SchedulerHandle::stop`] waits before cancelling.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Spawns both tasks on the current Tokio runtime.
    ///
    /// The first cycle of each reconciler starts immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, _) = watch::channel(false);
        let profile_stats = Arc::new(RwLock::new(ReconcilerStats::default()));
        let model_stats = Arc::new(RwLock::new(ReconcilerStats::default()));

        self.profile.reset_cancel();
        self.model.reset_cancel();

        info!(
            profile_interval_secs = self.profile_interval.as_secs_f64(),
            model_interval_secs = self.model_interval.as_secs_f64(),
            "sync scheduler started"
        );

        let tasks = vec![
            tokio::spawn(run_loop(
                Arc::clone(&self.profile),
                self.profile_interval,
                Arc::clone(&profile_stats),
                shutdown.subscribe(),
            )),
            tokio::spawn(run_loop(
                Arc::clone(&self.model),
                self.model_interval,
                Arc::clone(&model_stats),
                shutdown.subscribe(),
            )),
        ];

        let profile = self.profile;
        let model = self.model;
        let cancel: Box<dyn Fn() + Send + Sync> = Box::new(move || {
            profile.cancel();
            model.cancel();
        });

        SchedulerHandle {
            shutdown,
            tasks,
            cancel,
            profile_stats,
            model_stats,
            grace: self.shutdown_grace,
        }
    }

    /// Runs until `signal` completes, then stops and returns the final
    /// statistics.
    pub async fn run_until<F: Future<Output = ()>>(self, signal: F) -> SchedulerStats {
        let handle = self.start();
        signal.await;
        handle.stop().await
    }
}

/// Shortest period a reconciler can tick at; tokio rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

fn usable_interval(reconciler: &'static str, interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        warn!(reconciler, ?interval, "sync interval too short, using 1ms");
        MIN_INTERVAL
    } else {
        interval
    }
}

/// Handle to a running [`SyncScheduler`].
///
/// Dropping the handle without [`stop`](Self::stop) also ends the tasks
/// after their in-flight cycles, without waiting for them.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    cancel: Box<dyn Fn() + Send + Sync>,
    profile_stats: Arc<RwLock<ReconcilerStats>>,
    model_stats: Arc<RwLock<ReconcilerStats>>,
    grace: Duration,
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("tasks", &self.tasks.len())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            profile: self.profile_stats.read().clone(),
            model: self.model_stats.read().clone(),
        }
    }

    /// Stops both tasks and returns the final statistics.
    ///
    /// In-flight cycles get the grace period to finish. After that the
    /// reconcilers are cancelled and get one more grace period to unwind;
    /// tasks still running then are abandoned.
    pub async fn stop(mut self) -> SchedulerStats {
        // Receivers are owned by the tasks; a send error means they are gone.
        let _ = self.shutdown.send(true);

        if tokio::time::timeout(self.grace, join_all(&mut self.tasks))
            .await
            .is_err()
        {
            warn!(
                grace_ms = self.grace.as_millis() as u64,
                "sync cycles still running after grace period, cancelling"
            );
            (self.cancel)();

            if tokio::time::timeout(self.grace, join_all(&mut self.tasks))
                .await
                .is_err()
            {
                error!("sync cycles ignored cancellation, abandoning them");
                for task in &self.tasks {
                    task.abort();
                }
            }
        }

        info!("sync scheduler stopped");
        self.stats()
    }
}

/// Awaits every task, removing each one as it completes so the list can be
/// awaited again after a timeout.
async fn join_all(tasks: &mut Vec<JoinHandle<()>>) {
    while let Some(task) = tasks.last_mut() {
        if let Err(e) = task.await {
            error!(error = %e, "scheduler task ended abnormally");
        }
        tasks.pop();
    }
}

async fn run_loop<R: Reconcile>(
    reconciler: Arc<R>,
    period: Duration,
    stats: Arc<RwLock<ReconcilerStats>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = reconciler.name();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let worker = Arc::clone(&reconciler);
        match tokio::task::spawn_blocking(move || worker.reconcile()).await {
            Ok(outcome) => {
                let failed = outcome.is_failure();
                if failed {
                    warn!(reconciler = name, outcome = %outcome, "sync cycle failed");
                } else {
                    debug!(reconciler = name, outcome = %outcome, "sync cycle finished");
                }
                stats.write().record(outcome.to_string(), failed, false);
            }
            Err(e) if e.is_panic() => {
                error!(reconciler = name, error = %e, "reconciler panicked");
                stats.write().record(format!("panicked: {e}"), true, true);
            }
            Err(e) => {
                error!(reconciler = name, error = %e, "reconciler task cancelled");
                stats.write().record(format!("cancelled: {e}"), true, false);
            }
        }
    }

    debug!(reconciler = name, "sync task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Instant;

    #[derive(Debug)]
    struct Outcome(bool);

    impl fmt::Display for Outcome {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(if self.0 { "failed" } else { "ok" })
        }
    }

    impl CycleOutcome for Outcome {
        fn is_failure(&self) -> bool {
            self.0
        }
    }

    enum Behavior {
        Succeed,
        Fail,
        Panic,
        /// Blocks until cancelled.
        Stuck,
    }

    struct Probe {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicU64,
        cancelled: AtomicBool,
    }

    impl Probe {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Reconcile for Probe {
        type Outcome = Outcome;

        fn name(&self) -> &'static str {
            self.name
        }

        fn reconcile(&self) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Outcome(false),
                Behavior::Fail => Outcome(true),
                Behavior::Panic => panic!("probe panic"),
                Behavior::Stuck => {
                    while !self.cancelled.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Outcome(true)
                }
            }
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        fn reset_cancel(&self) {
            self.cancelled.store(false, Ordering::SeqCst);
        }
    }

    fn scheduler(profile: &Arc<Probe>, model: &Arc<Probe>) -> SyncScheduler<Probe, Probe> {
        SyncScheduler::new(Arc::clone(profile), Arc::clone(model))
            .with_profile_interval(Duration::from_millis(20))
            .with_model_interval(Duration::from_millis(50))
            .with_shutdown_grace(Duration::from_millis(200))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn both_reconcilers_tick_independently() {
        let profile = Probe::new("profile", Behavior::Succeed);
        let model = Probe::new("model", Behavior::Succeed);

        let handle = scheduler(&profile, &model).start();
        tokio::time::sleep(Duration::from_millis(230)).await;
        let stats = handle.stop().await;

        assert!(profile.calls() >= 3, "profile ran {} times", profile.calls());
        assert!(model.calls() >= 2, "model ran {} times", model.calls());
        assert!(profile.calls() > model.calls());
        assert_eq!(stats.profile.runs, profile.calls());
        assert_eq!(stats.profile.failures, 0);
        assert_eq!(stats.model.last_outcome.as_deref(), Some("ok"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_reconciler_does_not_stop_the_other() {
        let profile = Probe::new("profile", Behavior::Fail);
        let model = Probe::new("model", Behavior::Succeed);

        let handle = scheduler(&profile, &model).start();
        tokio::time::sleep(Duration::from_millis(230)).await;
        let stats = handle.stop().await;

        assert!(stats.profile.failures >= 3);
        assert_eq!(stats.profile.failures, stats.profile.runs);
        assert!(stats.model.runs >= 2);
        assert_eq!(stats.model.failures, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_reconciler_keeps_ticking() {
        let profile = Probe::new("profile", Behavior::Succeed);
        let model = Probe::new("model", Behavior::Panic);

        let handle = scheduler(&profile, &model).start();
        tokio::time::sleep(Duration::from_millis(230)).await;
        let stats = handle.stop().await;

        assert!(stats.model.panics >= 2, "model panicked {} times", stats.model.panics);
        assert!(stats.profile.runs >= 3);
        assert_eq!(stats.profile.panics, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_cancels_stuck_reconciler() {
        let profile = Probe::new("profile", Behavior::Succeed);
        let model = Probe::new("model", Behavior::Stuck);

        let handle = scheduler(&profile, &model).start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let stats = handle.stop().await;
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(model.cancelled.load(Ordering::SeqCst));
        assert_eq!(stats.model.runs, 1);
        assert_eq!(stats.model.failures, 1);
    }

    #[test]
    fn zero_interval_is_raised() {
        assert_eq!(usable_interval("profile", Duration::ZERO), MIN_INTERVAL);
        assert_eq!(
            usable_interval("model", Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_interval_still_runs() {
        let profile = Probe::new("profile", Behavior::Succeed);
        let model = Probe::new("model", Behavior::Succeed);

        let stats = SyncScheduler::new(Arc::clone(&profile), Arc::clone(&model))
            .with_profile_interval(Duration::ZERO)
            .with_model_interval(Duration::ZERO)
            .with_shutdown_grace(Duration::from_millis(200))
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await;

        assert!(stats.profile.runs >= 2, "profile ran {} times", stats.profile.runs);
        assert!(stats.model.runs >= 2, "model ran {} times", stats.model.runs);
        assert_eq!(stats.profile.panics + stats.model.panics, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_until_returns_final_stats() {
        let profile = Probe::new("profile", Behavior::Succeed);
        let model = Probe::new("model", Behavior::Succeed);

        let stats = scheduler(&profile, &model)
            .run_until(tokio::time::sleep(Duration::from_millis(60)))
            .await;
        assert!(stats.profile.runs >= 1);
        assert!(stats.model.runs >= 1);
    }
}
