use std::sync::RwLock;

use crate::config::NotificationSettings;

pub trait Preferences: Send + Sync {
    fn notification_settings(&self) -> NotificationSettings;
}

/// Notification preferences shared between the worker and the control API.
#[derive(Debug, Default)]
pub struct SharedPreferences {
    settings: RwLock<NotificationSettings>,
}

impl SharedPreferences {
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn set(&self, settings: NotificationSettings) {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }
}

impl Preferences for SharedPreferences {
    fn notification_settings(&self) -> NotificationSettings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
