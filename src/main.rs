use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use servhub::config::AppConfig;
use servhub::db;
use servhub::handlers;
use servhub::services::ai::http::HttpAiProvider;
use servhub::services::outbox;
use servhub::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let ai = HttpAiProvider::new(config.ai_base_url.clone(), config.ai_api_key.clone());
    tracing::info!("using AI service at {}", config.ai_base_url);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        ai: Box::new(ai),
    });

    // Retryable side effects (embeddings, moderation re-checks) drain here.
    let worker_state = Arc::clone(&state);
    let poll_secs = config.outbox_poll_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(poll_secs));
        loop {
            interval.tick().await;
            match outbox::run_once(&worker_state).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(processed = n, "outbox cycle complete"),
                Err(e) => tracing::error!(error = %e, "outbox cycle failed"),
            }
        }
    });

    let app = app_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        // Bookings
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings)
                .post(handlers::bookings::create_booking)
                .patch(handlers::bookings::update_booking),
        )
        .route("/api/bookings/day", get(handlers::bookings::provider_day))
        .route("/api/bookings/bulk", post(handlers::bookings::bulk_update))
        // Reviews
        .route(
            "/api/reviews",
            get(handlers::reviews::list_reviews).post(handlers::reviews::create_review),
        )
        // Posts
        .route(
            "/api/posts",
            get(handlers::posts::browse_posts).post(handlers::posts::create_post),
        )
        .route("/api/posts/suggest-category", post(handlers::posts::suggest_category))
        .route("/api/posts/:id/status", patch(handlers::posts::update_status))
        .route("/api/posts/:id/appeal", post(handlers::posts::appeal_post))
        .route("/api/posts/:id", delete(handlers::posts::delete_post))
        .route("/api/posts/:id/extend", post(handlers::posts::extend_post))
        .route("/api/posts/:id/phone-click", post(handlers::posts::phone_click))
        .route("/api/posts/:id/embedding", post(handlers::posts::generate_embedding))
        .route("/api/users/:id/posts", get(handlers::posts::user_posts))
        .route("/api/my-posts", get(handlers::posts::my_posts))
        // Moderation
        .route("/api/moderate", post(handlers::moderate::moderate_post))
        // Lookups & feeds
        .route("/api/cities", get(handlers::cities::search))
        .route("/api/activity", get(handlers::activity::list_activity))
        .route("/api/categories", get(handlers::categories::list))
        .route("/api/sections", get(handlers::sections::list_public))
        // Admin: categories
        .route("/api/admin/categories", post(handlers::categories::create))
        .route(
            "/api/admin/categories/reorder",
            post(handlers::categories::reorder).patch(handlers::categories::reorder_batch),
        )
        .route(
            "/api/admin/categories/sort-alphabetically",
            post(handlers::categories::sort_alphabetically),
        )
        .route(
            "/api/admin/categories/:id",
            patch(handlers::categories::update).delete(handlers::categories::delete),
        )
        // Admin: homepage sections
        .route(
            "/api/admin/sections",
            get(handlers::sections::list_all).post(handlers::sections::create),
        )
        .route("/api/admin/sections/reorder", patch(handlers::sections::reorder))
        .route(
            "/api/admin/sections/:id",
            patch(handlers::sections::update).delete(handlers::sections::delete),
        )
        // Admin: moderation queue & appeals
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route("/api/admin/moderation", get(handlers::admin::moderation_queue))
        .route(
            "/api/admin/moderation/:post_id",
            patch(handlers::admin::decide_moderation),
        )
        .route(
            "/api/admin/moderation/:post_id/logs",
            get(handlers::admin::moderation_logs),
        )
        .route(
            "/api/admin/appeals/:post_id",
            patch(handlers::admin::decide_appeal),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
