//! Feed Notifier - watches followed channels for new uploads
//!
//! This crate keeps a local database of subscriptions, refreshes their feeds
//! on a schedule and raises one notification per subscription that has new
//! streams.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod notifications;
pub mod preferences;
pub mod routes;
pub mod scheduler;
pub mod worker;
