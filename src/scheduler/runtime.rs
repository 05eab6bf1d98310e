use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    BackoffCriteria, Constraints, ExistingPeriodicWorkPolicy, JobScheduler, NetworkMonitor,
    OneTimeWorkRequest, PeriodicWorkRequest, Work, WorkResult,
};

/// How often unmet constraints are re-checked.
pub const CONSTRAINT_RECHECK: Duration = Duration::from_secs(60);

struct PeriodicEntry {
    request: PeriodicWorkRequest,
    handle: JoinHandle<()>,
}

/// Runs jobs as tokio tasks. Must be used from within a tokio runtime.
///
/// Periodic jobs run once on registration and then every interval. Failed
/// runs are retried according to the request's backoff until they succeed.
/// One-off jobs are not coordinated with periodic ones and may overlap them.
pub struct TokioJobScheduler {
    network: Arc<dyn NetworkMonitor>,
    periodic: Mutex<HashMap<String, PeriodicEntry>>,
    running: Arc<AtomicUsize>,
}

impl TokioJobScheduler {
    pub fn new(network: Arc<dyn NetworkMonitor>) -> Self {
        Self {
            network,
            periodic: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn periodic(&self) -> MutexGuard<'_, HashMap<String, PeriodicEntry>> {
        self.periodic
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JobScheduler for TokioJobScheduler {
    fn enqueue_unique_periodic_work(
        &self,
        name: &str,
        policy: ExistingPeriodicWorkPolicy,
        request: PeriodicWorkRequest,
        work: Arc<dyn Work>,
    ) {
        let mut periodic = self.periodic();

        if let Some(existing) = periodic.get(name) {
            if policy == ExistingPeriodicWorkPolicy::Keep && !existing.handle.is_finished() {
                debug!("Periodic job '{}' already scheduled, keeping it", name);
                return;
            }
        }

        if let Some(old) = periodic.remove(name) {
            info!("Replacing periodic job '{}'", name);
            old.handle.abort();
        }

        info!(
            "Scheduling periodic job '{}' every {}s ({:?} network)",
            name,
            request.interval.as_secs(),
            request.constraints.required_network
        );

        let handle = tokio::spawn(run_periodic(
            name.to_string(),
            request.clone(),
            work,
            self.network.clone(),
            self.running.clone(),
        ));
        periodic.insert(name.to_string(), PeriodicEntry { request, handle });
    }

    fn enqueue(&self, request: OneTimeWorkRequest, work: Arc<dyn Work>) {
        info!("Enqueueing one-off job '{}'", request.tag);
        let network = self.network.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            run_until_success(
                &request.tag,
                work.as_ref(),
                &request.constraints,
                &request.backoff,
                network.as_ref(),
                &running,
            )
            .await;
        });
    }

    fn cancel_unique_work(&self, name: &str) {
        if let Some(entry) = self.periodic().remove(name) {
            info!("Cancelled periodic job '{}'", name);
            entry.handle.abort();
        }
    }

    fn periodic_request(&self, name: &str) -> Option<PeriodicWorkRequest> {
        self.periodic().get(name).map(|entry| entry.request.clone())
    }

    fn in_flight(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for TokioJobScheduler {
    fn drop(&mut self) {
        for (_, entry) in self.periodic().drain() {
            entry.handle.abort();
        }
    }
}

async fn run_periodic(
    name: String,
    request: PeriodicWorkRequest,
    work: Arc<dyn Work>,
    network: Arc<dyn NetworkMonitor>,
    running: Arc<AtomicUsize>,
) {
    loop {
        run_until_success(
            &name,
            work.as_ref(),
            &request.constraints,
            &request.backoff,
            network.as_ref(),
            &running,
        )
        .await;
        tokio::time::sleep(request.interval).await;
    }
}

async fn run_until_success(
    name: &str,
    work: &dyn Work,
    constraints: &Constraints,
    backoff: &BackoffCriteria,
    network: &dyn NetworkMonitor,
    running: &Arc<AtomicUsize>,
) {
    let mut attempt = 0;
    loop {
        wait_for_constraints(name, constraints, network).await;

        let result = {
            let _guard = RunningGuard::new(running.clone());
            work.do_work().await
        };

        match result {
            WorkResult::Success => {
                debug!("Job '{}' succeeded", name);
                return;
            }
            WorkResult::Failure => {
                attempt += 1;
                let delay = backoff.delay_for_attempt(attempt);
                warn!(
                    "Job '{}' failed (attempt {}), retrying in {}s",
                    name,
                    attempt,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn wait_for_constraints(name: &str, constraints: &Constraints, network: &dyn NetworkMonitor) {
    loop {
        let state = network.current();
        if constraints.satisfied_by(state) {
            return;
        }
        debug!("Job '{}' waiting for network ({:?})", name, state);
        tokio::time::sleep(CONSTRAINT_RECHECK).await;
    }
}

/// Counts a run as in flight until dropped, including on task abort.
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{NetworkState, NetworkType, StaticNetwork};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// Replays scripted results, then succeeds.
    #[derive(Default)]
    struct ScriptedWork {
        runs: AtomicUsize,
        script: Mutex<VecDeque<WorkResult>>,
    }

    impl ScriptedWork {
        fn failing(times: usize) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                script: Mutex::new(std::iter::repeat(WorkResult::Failure).take(times).collect()),
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Work for ScriptedWork {
        async fn do_work(&self) -> WorkResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(WorkResult::Success)
        }
    }

    /// Every run blocks until released.
    #[derive(Default)]
    struct GatedWork {
        started: AtomicUsize,
        release: Notify,
    }

    impl GatedWork {
        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Work for GatedWork {
        async fn do_work(&self) -> WorkResult {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            WorkResult::Success
        }
    }

    fn periodic(interval_secs: u64, network: NetworkType) -> PeriodicWorkRequest {
        PeriodicWorkRequest {
            interval: Duration::from_secs(interval_secs),
            constraints: Constraints {
                required_network: network,
            },
            backoff: BackoffCriteria::linear(Duration::from_secs(30 * 60)),
            tag: "test".to_string(),
        }
    }

    fn one_off() -> OneTimeWorkRequest {
        OneTimeWorkRequest {
            constraints: Constraints::default(),
            backoff: BackoffCriteria::linear(Duration::from_secs(30 * 60)),
            tag: "test".to_string(),
        }
    }

    /// Let spawned tasks make progress without advancing the clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn scheduler(state: NetworkState) -> (TokioJobScheduler, Arc<StaticNetwork>) {
        let network = Arc::new(StaticNetwork::new(state));
        (TokioJobScheduler::new(network.clone()), network)
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs_immediately_then_every_interval() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let work = Arc::new(ScriptedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(3600, NetworkType::Connected),
            work.clone(),
        );
        settle().await;
        assert_eq!(work.runs(), 1);

        tokio::time::sleep(Duration::from_secs(3601)).await;
        settle().await;
        assert_eq!(work.runs(), 2);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(work.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_ignores_new_parameters() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let work = Arc::new(ScriptedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(3600, NetworkType::Connected),
            work.clone(),
        );
        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(900, NetworkType::Unmetered),
            work.clone(),
        );

        let request = scheduler.periodic_request("job").unwrap();
        assert_eq!(request.interval, Duration::from_secs(3600));
        assert_eq!(request.constraints.required_network, NetworkType::Connected);

        settle().await;
        assert_eq!(work.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_swaps_parameters() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let old_work = Arc::new(ScriptedWork::default());
        let new_work = Arc::new(ScriptedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(3600, NetworkType::Connected),
            old_work.clone(),
        );
        settle().await;
        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Replace,
            periodic(900, NetworkType::Unmetered),
            new_work.clone(),
        );
        settle().await;

        let request = scheduler.periodic_request("job").unwrap();
        assert_eq!(request.interval, Duration::from_secs(900));
        assert_eq!(request.constraints.required_network, NetworkType::Unmetered);

        tokio::time::sleep(Duration::from_secs(3600 + 60)).await;
        settle().await;
        // The replaced job no longer runs
        assert_eq!(old_work.runs(), 1);
        assert_eq!(new_work.runs(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retries_with_linear_backoff() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let work = Arc::new(ScriptedWork::failing(2));

        scheduler.enqueue(one_off(), work.clone());
        settle().await;
        assert_eq!(work.runs(), 1);

        // First retry after 30 minutes
        tokio::time::sleep(Duration::from_secs(30 * 60 + 1)).await;
        settle().await;
        assert_eq!(work.runs(), 2);

        // Second retry after a further 60 minutes
        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        settle().await;
        assert_eq!(work.runs(), 2);
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(work.runs(), 3);

        // Succeeded: a one-off never runs again
        tokio::time::sleep(Duration::from_secs(10 * 60 * 60)).await;
        settle().await;
        assert_eq!(work.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmetered_constraint_waits_for_network() {
        let (scheduler, network) = scheduler(NetworkState::Metered);
        let work = Arc::new(ScriptedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(3600, NetworkType::Unmetered),
            work.clone(),
        );
        settle().await;
        assert_eq!(work.runs(), 0);

        network.set(NetworkState::Unmetered);
        tokio::time::sleep(CONSTRAINT_RECHECK + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(work.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_off_does_not_touch_periodic() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let work = Arc::new(ScriptedWork::default());

        scheduler.enqueue(one_off(), work.clone());
        settle().await;

        assert_eq!(work.runs(), 1);
        assert!(scheduler.periodic_request("test").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unique_work() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let work = Arc::new(ScriptedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(60 * 15, NetworkType::Connected),
            work.clone(),
        );
        settle().await;
        scheduler.cancel_unique_work("job");
        assert!(scheduler.periodic_request("job").is_none());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(work.runs(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_starts_at_zero() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_off_overlaps_periodic_run() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let work = Arc::new(GatedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(3600, NetworkType::Connected),
            work.clone(),
        );
        scheduler.enqueue(one_off(), work.clone());
        settle().await;

        assert_eq!(work.started(), 2);
        assert_eq!(scheduler.in_flight(), 2);

        work.release.notify_waiters();
        settle().await;
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_run_no_longer_in_flight() {
        let (scheduler, _) = scheduler(NetworkState::Unmetered);
        let blocked = Arc::new(GatedWork::default());
        let replacement = Arc::new(ScriptedWork::default());

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Keep,
            periodic(3600, NetworkType::Connected),
            blocked.clone(),
        );
        settle().await;
        assert_eq!(scheduler.in_flight(), 1);

        scheduler.enqueue_unique_periodic_work(
            "job",
            ExistingPeriodicWorkPolicy::Replace,
            periodic(3600, NetworkType::Connected),
            replacement.clone(),
        );
        settle().await;

        assert_eq!(replacement.runs(), 1);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_off_without_network_requirement_runs_offline() {
        let (scheduler, _) = scheduler(NetworkState::Disconnected);
        let work = Arc::new(ScriptedWork::default());

        scheduler.enqueue(
            OneTimeWorkRequest {
                constraints: Constraints::none(),
                ..one_off()
            },
            work.clone(),
        );
        settle().await;

        assert_eq!(work.runs(), 1);
    }
}
