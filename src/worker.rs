//! The periodic refresh-and-notify job and its scheduling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::{NetworkPreference, NotificationSettings};
use crate::db::NotificationMode;
use crate::feed::{FeedLoader, FeedUpdateInfo};
use crate::notifications::Notifier;
use crate::preferences::Preferences;
use crate::scheduler::{
    BackoffCriteria, Constraints, ExistingPeriodicWorkPolicy, JobScheduler, NetworkType,
    OneTimeWorkRequest, PeriodicWorkRequest, Work, WorkResult, MIN_PERIODIC_INTERVAL,
};

/// Unique name and tag of the notification job.
pub const WORK_NAME: &str = "notifications";

pub const BACKOFF_DELAY: Duration = Duration::from_secs(30 * 60);

/// Refreshes every subscription and notifies about new streams.
pub struct NotificationWorker {
    preferences: Arc<dyn Preferences>,
    loader: Arc<dyn FeedLoader>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(
        preferences: Arc<dyn Preferences>,
        loader: Arc<dyn FeedLoader>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            preferences,
            loader,
            notifier,
        }
    }

    /// The user wants notifications and the presenter may show them.
    pub fn is_enabled(&self) -> bool {
        self.preferences.notification_settings().enabled && self.notifier.notifications_permitted()
    }

    pub async fn create_work(&self) -> WorkResult {
        if !self.is_enabled() {
            debug!("Stream notifications disabled, skipping refresh");
            return WorkResult::Success;
        }

        let outcomes = match self.loader.start_loading().await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("Feed loading failed: {}", e);
                return WorkResult::Failure;
            }
        };

        let mut result = WorkResult::Success;
        let mut sent = 0;
        for update in outcomes.into_iter().filter_map(Result::ok) {
            if should_notify(&update) {
                if let Err(e) = self.notifier.notify(&update).await {
                    // Stays unacknowledged until delivered
                    error!("Failed to notify about '{}': {}", update.name, e);
                    result = WorkResult::Failure;
                    continue;
                }
                sent += 1;
            }
            if let Err(e) = self.loader.acknowledge(&update).await {
                error!("Failed to record streams of '{}': {}", update.name, e);
                result = WorkResult::Failure;
            }
        }

        info!("Dispatched {} stream notifications", sent);
        result
    }
}

#[async_trait]
impl Work for NotificationWorker {
    async fn do_work(&self) -> WorkResult {
        self.create_work().await
    }
}

pub fn should_notify(update: &FeedUpdateInfo) -> bool {
    update.notification_mode == NotificationMode::EnabledDefault && update.new_streams_count() > 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    interval: Duration,
    require_non_metered_network: bool,
}

impl ScheduleOptions {
    /// Intervals below [`MIN_PERIODIC_INTERVAL`] are raised to it.
    pub fn new(interval: Duration, require_non_metered_network: bool) -> Self {
        Self {
            interval: interval.max(MIN_PERIODIC_INTERVAL),
            require_non_metered_network,
        }
    }

    pub fn from_settings(settings: &NotificationSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.interval),
            settings.network == NetworkPreference::Unmetered,
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_require_non_metered_network(&self) -> bool {
        self.require_non_metered_network
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            required_network: if self.require_non_metered_network {
                NetworkType::Unmetered
            } else {
                NetworkType::Connected
            },
        }
    }
}

/// Schedules [`NotificationWorker`] runs through a [`JobScheduler`].
pub struct NotificationJobs {
    scheduler: Arc<dyn JobScheduler>,
    worker: Arc<NotificationWorker>,
    preferences: Arc<dyn Preferences>,
}

impl NotificationJobs {
    pub fn new(
        scheduler: Arc<dyn JobScheduler>,
        worker: Arc<NotificationWorker>,
        preferences: Arc<dyn Preferences>,
    ) -> Self {
        Self {
            scheduler,
            worker,
            preferences,
        }
    }

    /// Register the periodic job. An existing registration is kept unless
    /// `force` is set, in which case it is replaced.
    pub fn schedule(&self, options: &ScheduleOptions, force: bool) {
        let request = PeriodicWorkRequest {
            interval: options.interval(),
            constraints: options.constraints(),
            backoff: BackoffCriteria::linear(BACKOFF_DELAY),
            tag: WORK_NAME.to_string(),
        };
        let policy = if force {
            ExistingPeriodicWorkPolicy::Replace
        } else {
            ExistingPeriodicWorkPolicy::Keep
        };
        self.scheduler
            .enqueue_unique_periodic_work(WORK_NAME, policy, request, self.worker.clone());
    }

    pub fn schedule_from_preferences(&self) {
        self.schedule(&self.options_from_preferences(), false);
    }

    pub fn options_from_preferences(&self) -> ScheduleOptions {
        ScheduleOptions::from_settings(&self.preferences.notification_settings())
    }

    /// Run the worker once, independently of the periodic schedule. The run
    /// has no network requirement.
    pub fn run_now(&self) {
        let request = OneTimeWorkRequest {
            constraints: Constraints::none(),
            backoff: BackoffCriteria::linear(BACKOFF_DELAY),
            tag: WORK_NAME.to_string(),
        };
        self.scheduler.enqueue(request, self.worker.clone());
    }

    pub fn current_schedule(&self) -> Option<PeriodicWorkRequest> {
        self.scheduler.periodic_request(WORK_NAME)
    }

    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }
}
