use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_notifier::config::Config;
use feed_notifier::db::Database;
use feed_notifier::feed::{FeedLoadManager, HttpListingSource};
use feed_notifier::notifications::{LogNotifier, Notifier, WebhookNotifier};
use feed_notifier::preferences::SharedPreferences;
use feed_notifier::routes::{self, AppState};
use feed_notifier::scheduler::{StaticNetwork, TokioJobScheduler};
use feed_notifier::worker::{NotificationJobs, NotificationWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_notifier=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("FEED_NOTIFIER_CONFIG")
        .unwrap_or_else(|_| "feed-notifier.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} subscriptions from {}",
        config.subscriptions.len(),
        config_path
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    db.subscriptions().sync(&config.subscriptions).await?;
    info!("Database initialized");

    let db = Arc::new(db);
    let preferences = Arc::new(SharedPreferences::new(config.notifications.clone()));

    let notifier: Arc<dyn Notifier> = match &config.webhook {
        Some(webhook) => {
            info!("Delivering notifications to {}", webhook.url);
            Arc::new(WebhookNotifier::new(&webhook.url)?)
        }
        None => Arc::new(LogNotifier),
    };

    let loader = Arc::new(FeedLoadManager::new(
        &db,
        Arc::new(HttpListingSource::new()?),
    ));
    let worker = Arc::new(NotificationWorker::new(
        preferences.clone(),
        loader,
        notifier,
    ));

    // Register the periodic refresh
    let network = Arc::new(StaticNetwork::from_metered(config.network.metered));
    let scheduler = Arc::new(TokioJobScheduler::new(network));
    let jobs = Arc::new(NotificationJobs::new(
        scheduler,
        worker,
        preferences.clone(),
    ));
    jobs.schedule_from_preferences();

    let state = Arc::new(AppState {
        db: db.clone(),
        jobs: jobs.clone(),
        preferences,
    });

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Control API listening on http://{}", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
