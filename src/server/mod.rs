pub mod health;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::mailer::Mailer;
use crate::models::CollectorConfig;
use crate::pipeline::{Ingestor, Notifier, SearchRegistry, SeenTracker};
use crate::sources::JobSource;
use crate::storage::Store;

/// Shared application state for the Axum server.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: SearchRegistry,
    pub tracker: SeenTracker,
    pub ingestor: Ingestor,
    pub notifier: Notifier,
    pub config: Arc<CollectorConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipeline components over one store.
    pub fn new(
        store: Arc<dyn Store>,
        sources: Vec<Arc<dyn JobSource>>,
        mailer: Arc<dyn Mailer>,
        config: Arc<CollectorConfig>,
    ) -> Self {
        let registry = SearchRegistry::new(Arc::clone(&store));
        let tracker = SeenTracker::new(Arc::clone(&store), registry.clone());
        let ingestor = Ingestor::new(Arc::clone(&store), sources);
        let notifier = Notifier::new(
            registry.clone(),
            tracker.clone(),
            ingestor.clone(),
            mailer,
        );
        Self {
            store,
            registry,
            tracker,
            ingestor,
            notifier,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/jobs", get(routes::list_jobs))
        .route("/api/jobs/search", get(routes::search_jobs))
        .route("/api/ingest", post(routes::ingest_all))
        .route("/api/ingest/{source}", post(routes::ingest_source))
        .route(
            "/api/searches",
            get(routes::list_searches).post(routes::upsert_search),
        )
        .route("/api/searches/{name}", get(routes::get_search))
        .route("/api/searches/{name}/run", get(routes::preview_search))
        .route("/api/searches/{name}/new", get(routes::new_jobs))
        .route("/api/searches/{name}/feed", get(routes::search_feed))
        .route("/api/searches/{name}/new-count", get(routes::new_count))
        .route("/api/dashboard", get(routes::dashboard))
        .route(
            "/api/tasks/searches/{name}/run",
            post(routes::task_run_search),
        )
        .route("/api/tasks/run-all", post(routes::task_run_all))
        .route("/api/tasks/email/test", post(routes::task_email_test))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}
