use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::NotificationSettings;
use crate::db::{Database, NotificationMode, SubscriptionEntity};
use crate::preferences::{Preferences, SharedPreferences};
use crate::scheduler::PeriodicWorkRequest;
use crate::worker::NotificationJobs;

pub struct AppState {
    pub db: Arc<Database>,
    pub jobs: Arc<NotificationJobs>,
    pub preferences: Arc<SharedPreferences>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/schedule", get(get_schedule).post(reschedule))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/subscriptions", get(list_subscriptions))
        .route(
            "/subscriptions/:uid/notification_mode",
            put(put_notification_mode),
        )
        .with_state(state)
}

pub enum AppError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("Not found: {}", what)).into_response()
            }
            AppError::Internal(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", err)).into_response()
            }
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::Internal(err.into())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshQueued {
    pub queued: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub running: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ModeUpdate {
    pub mode: NotificationMode,
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Manual refresh requested");
    state.jobs.run_now();
    (StatusCode::ACCEPTED, Json(RefreshQueued { queued: true }))
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<RefreshStatus> {
    Json(RefreshStatus {
        running: state.jobs.in_flight(),
    })
}

pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PeriodicWorkRequest>, AppError> {
    state
        .jobs
        .current_schedule()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("schedule".to_string()))
}

/// Schedule from the current settings; `?force=true` replaces an existing
/// schedule.
pub async fn reschedule(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<PeriodicWorkRequest>, AppError> {
    let options = state.jobs.options_from_preferences();
    state.jobs.schedule(&options, query.force);
    get_schedule(State(state)).await
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<NotificationSettings> {
    Json(state.preferences.notification_settings())
}

/// Store new settings. The schedule only picks up a changed interval or
/// network preference on a forced reschedule.
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<NotificationSettings>,
) -> Json<NotificationSettings> {
    state.preferences.set(settings.clone());
    Json(settings)
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SubscriptionEntity>>, AppError> {
    let subscriptions = state.db.subscriptions().get_all().await?;
    Ok(Json(subscriptions))
}

pub async fn put_notification_mode(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<i64>,
    Json(update): Json<ModeUpdate>,
) -> Result<Json<SubscriptionEntity>, AppError> {
    let dao = state.db.subscriptions();
    if !dao.update_notification_mode(uid, update.mode).await? {
        return Err(AppError::NotFound(format!("subscription {}", uid)));
    }
    let subscription = dao
        .get(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("subscription {}", uid)))?;
    Ok(Json(subscription))
}
