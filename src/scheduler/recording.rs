use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{ExistingPeriodicWorkPolicy, JobScheduler, OneTimeWorkRequest, PeriodicWorkRequest, Work};

#[derive(Clone)]
pub struct RecordedOneOff {
    pub request: OneTimeWorkRequest,
    pub work: Arc<dyn Work>,
}

#[derive(Default)]
struct Registry {
    periodic: HashMap<String, PeriodicWorkRequest>,
    one_off: Vec<RecordedOneOff>,
}

/// A [`JobScheduler`] that records registrations and never runs anything.
/// Recorded work can be run by hand.
#[derive(Default)]
pub struct RecordingScheduler {
    registry: Mutex<Registry>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn one_off_requests(&self) -> Vec<RecordedOneOff> {
        self.registry().one_off.clone()
    }
}

impl JobScheduler for RecordingScheduler {
    fn enqueue_unique_periodic_work(
        &self,
        name: &str,
        policy: ExistingPeriodicWorkPolicy,
        request: PeriodicWorkRequest,
        _work: Arc<dyn Work>,
    ) {
        let mut registry = self.registry();
        if policy == ExistingPeriodicWorkPolicy::Keep && registry.periodic.contains_key(name) {
            return;
        }
        registry.periodic.insert(name.to_string(), request);
    }

    fn enqueue(&self, request: OneTimeWorkRequest, work: Arc<dyn Work>) {
        self.registry().one_off.push(RecordedOneOff { request, work });
    }

    fn cancel_unique_work(&self, name: &str) {
        self.registry().periodic.remove(name);
    }

    fn periodic_request(&self, name: &str) -> Option<PeriodicWorkRequest> {
        self.registry()
            .periodic
            .get(name)
            .cloned()
    }

    fn in_flight(&self) -> usize {
        0
    }
}
