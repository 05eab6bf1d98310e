use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::db::subscription::NotificationMode;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub network: NetworkConfig,
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

fn default_database_url() -> String {
    "sqlite:feed_notifier.db?mode=rwc".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

/// User preferences controlling new-stream notifications.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Check interval in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub network: NetworkPreference,
}

fn default_interval() -> u64 {
    4 * 60 * 60
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_interval(),
            network: NetworkPreference::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPreference {
    #[default]
    Any,
    Unmetered,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NetworkConfig {
    /// Whether the host's uplink should be treated as metered
    #[serde(default)]
    pub metered: bool,
}

/// Where notifications are POSTed; without it they are only logged.
#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubscriptionConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub notification_mode: NotificationMode,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Every subscription needs a distinct URL, and a webhook needs a target.
    pub fn validate(&self) -> Result<()> {
        let mut urls = HashSet::new();
        for subscription in &self.subscriptions {
            if subscription.url.trim().is_empty() {
                return Err(Error::Config(format!(
                    "subscription '{}' has no url",
                    subscription.name
                )));
            }
            if !urls.insert(subscription.url.as_str()) {
                return Err(Error::Config(format!(
                    "subscription url '{}' is listed twice",
                    subscription.url
                )));
            }
        }

        if let Some(webhook) = &self.webhook {
            if webhook.url.trim().is_empty() {
                return Err(Error::Config("webhook url is empty".to_string()));
            }
        }
        Ok(())
    }
}
