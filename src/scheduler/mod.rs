//! Background job scheduling.
//!
//! [`JobScheduler`] is the capability the rest of the crate schedules work
//! through. [`TokioJobScheduler`] runs jobs on the tokio runtime;
//! [`RecordingScheduler`] only records registrations.

mod network;
mod recording;
mod runtime;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use network::{NetworkMonitor, NetworkState, StaticNetwork};
pub use recording::{RecordedOneOff, RecordingScheduler};
pub use runtime::TokioJobScheduler;

/// Upper bound for any retry delay.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(5 * 60 * 60);

/// Shortest interval a periodic job may run at.
pub const MIN_PERIODIC_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    Failure,
}

#[async_trait]
pub trait Work: Send + Sync {
    async fn do_work(&self) -> WorkResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Runs regardless of connectivity
    NotRequired,
    /// Any working connection
    Connected,
    Unmetered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constraints {
    pub required_network: NetworkType,
}

impl Constraints {
    pub fn none() -> Self {
        Self {
            required_network: NetworkType::NotRequired,
        }
    }

    pub fn satisfied_by(&self, state: NetworkState) -> bool {
        match (self.required_network, state) {
            (NetworkType::NotRequired, _) => true,
            (_, NetworkState::Disconnected) => false,
            (NetworkType::Connected, _) => true,
            (NetworkType::Unmetered, NetworkState::Unmetered) => true,
            (NetworkType::Unmetered, NetworkState::Metered) => false,
        }
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            required_network: NetworkType::Connected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffPolicy {
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackoffCriteria {
    pub policy: BackoffPolicy,
    #[serde(with = "duration_secs")]
    pub delay: Duration,
}

impl BackoffCriteria {
    pub fn linear(delay: Duration) -> Self {
        Self {
            policy: BackoffPolicy::Linear,
            delay,
        }
    }

    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = match self.policy {
            BackoffPolicy::Linear => self.delay.saturating_mul(attempt.max(1)),
        };
        delay.min(MAX_BACKOFF_DELAY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodicWorkRequest {
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    pub constraints: Constraints,
    pub backoff: BackoffCriteria,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OneTimeWorkRequest {
    pub constraints: Constraints,
    pub backoff: BackoffCriteria,
    pub tag: String,
}

/// What to do when a unique periodic job with the same name exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingPeriodicWorkPolicy {
    Keep,
    Replace,
}

pub trait JobScheduler: Send + Sync {
    fn enqueue_unique_periodic_work(
        &self,
        name: &str,
        policy: ExistingPeriodicWorkPolicy,
        request: PeriodicWorkRequest,
        work: Arc<dyn Work>,
    );

    fn enqueue(&self, request: OneTimeWorkRequest, work: Arc<dyn Work>);

    fn cancel_unique_work(&self, name: &str);

    /// The registered parameters of a unique periodic job, if any.
    fn periodic_request(&self, name: &str) -> Option<PeriodicWorkRequest>;

    /// Number of job executions currently running.
    fn in_flight(&self) -> usize;
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod backoff_tests {
        use super::*;

        #[test]
        fn test_linear_backoff_grows_by_base() {
            let backoff = BackoffCriteria::linear(Duration::from_secs(30 * 60));

            assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(30 * 60));
            assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(60 * 60));
            assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(90 * 60));
        }

        #[test]
        fn test_attempt_zero_treated_as_first() {
            let backoff = BackoffCriteria::linear(Duration::from_secs(60));
            assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(60));
        }

        #[test]
        fn test_backoff_is_capped() {
            let backoff = BackoffCriteria::linear(Duration::from_secs(30 * 60));
            assert_eq!(backoff.delay_for_attempt(100), MAX_BACKOFF_DELAY);
        }
    }

    mod constraint_tests {
        use super::*;

        #[test]
        fn test_connected_accepts_any_link() {
            let c = Constraints {
                required_network: NetworkType::Connected,
            };
            assert!(c.satisfied_by(NetworkState::Unmetered));
            assert!(c.satisfied_by(NetworkState::Metered));
            assert!(!c.satisfied_by(NetworkState::Disconnected));
        }

        #[test]
        fn test_unmetered_rejects_metered_link() {
            let c = Constraints {
                required_network: NetworkType::Unmetered,
            };
            assert!(c.satisfied_by(NetworkState::Unmetered));
            assert!(!c.satisfied_by(NetworkState::Metered));
            assert!(!c.satisfied_by(NetworkState::Disconnected));
        }

        #[test]
        fn test_no_requirement_runs_offline() {
            let c = Constraints::none();
            assert!(c.satisfied_by(NetworkState::Metered));
            assert!(c.satisfied_by(NetworkState::Disconnected));
        }
    }
}
