use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::errors::CollectorError;
use crate::models::search::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::models::{Job, JobFilter, JobView, SavedSearchInput, SavedSearchView, SearchParams};
use crate::sources::SourceQuery;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

pub fn status_for(err: &CollectorError) -> StatusCode {
    match err {
        CollectorError::Validation(_) => StatusCode::BAD_REQUEST,
        CollectorError::NotFound(_) => StatusCode::NOT_FOUND,
        CollectorError::UpstreamAuth(_)
        | CollectorError::Upstream(_)
        | CollectorError::Notification(_) => StatusCode::BAD_GATEWAY,
        CollectorError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn collector_error(err: CollectorError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::warn!("Request rejected: {}", err);
    }
    error_response(status, err.code(), &err.to_string())
}

/// Malformed bodies and query strings are validation failures, reported in
/// the same shape as every other error.
fn invalid_json(rejection: JsonRejection) -> Response {
    collector_error(CollectorError::Validation(rejection.body_text()))
}

fn invalid_query(rejection: QueryRejection) -> Response {
    collector_error(CollectorError::Validation(rejection.body_text()))
}

fn ok_json<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

fn views(jobs: Vec<Job>) -> Vec<JobView> {
    jobs.into_iter().map(JobView::from).collect()
}

/// Reject `/api/tasks/*` calls without the configured shared secret.
fn require_cron_secret(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(ref expected) = state.config.cron_secret else {
        return Ok(());
    };
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        tracing::warn!("Rejected task call with missing or invalid cron secret");
        Err(error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Invalid cron secret",
        ))
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct ListJobsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DashboardParams {
    pub limit_jobs: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub search: SavedSearchView,
    pub results: Vec<JobView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewJobsResponse {
    pub search: SavedSearchView,
    pub new_jobs: Vec<JobView>,
    pub new_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedItem {
    pub job: JobView,
    pub seen: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub search: SavedSearchView,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewCountResponse {
    pub name: String,
    pub new_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_jobs: usize,
    pub search_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub searches: Vec<SavedSearchView>,
    pub latest_jobs: Vec<JobView>,
}

const DEFAULT_DASHBOARD_JOBS: usize = 20;

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return invalid_query(rejection),
    };
    match state.store.list(clamp_limit(params.limit)).await {
        Ok(jobs) => ok_json(views(jobs)),
        Err(e) => collector_error(e),
    }
}

/// GET /api/jobs/search
pub async fn search_jobs(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return invalid_query(rejection),
    };
    let filter = JobFilter::from_params(&params);
    match state.store.search(&filter, clamp_limit(params.limit)).await {
        Ok(jobs) => ok_json(views(jobs)),
        Err(e) => collector_error(e),
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// POST /api/ingest
pub async fn ingest_all(
    State(state): State<Arc<AppState>>,
    query: Result<Json<SourceQuery>, JsonRejection>,
) -> Response {
    let Json(query) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid_json(rejection),
    };
    match state.ingestor.ingest_all(&query).await {
        Ok(summary) => ok_json(summary),
        Err(e) => collector_error(e),
    }
}

/// POST /api/ingest/{source}
pub async fn ingest_source(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    query: Result<Json<SourceQuery>, JsonRejection>,
) -> Response {
    let Json(query) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid_json(rejection),
    };
    match state.ingestor.ingest_one(&source, &query).await {
        Ok(summary) => ok_json(summary),
        Err(e) => collector_error(e),
    }
}

// ---------------------------------------------------------------------------
// Saved searches
// ---------------------------------------------------------------------------

/// GET /api/searches
pub async fn list_searches(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.list_views().await {
        Ok(list) => ok_json(list),
        Err(e) => collector_error(e),
    }
}

/// POST /api/searches
pub async fn upsert_search(
    State(state): State<Arc<AppState>>,
    input: Result<Json<SavedSearchInput>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return invalid_json(rejection),
    };
    let saved = match state.registry.upsert(input).await {
        Ok(saved) => saved,
        Err(e) => return collector_error(e),
    };
    match state.registry.view(saved).await {
        Ok(view) => ok_json(view),
        Err(e) => collector_error(e),
    }
}

/// GET /api/searches/{name}
pub async fn get_search(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let search = match state.registry.require(&name).await {
        Ok(search) => search,
        Err(e) => return collector_error(e),
    };
    match state.registry.view(search).await {
        Ok(view) => ok_json(view),
        Err(e) => collector_error(e),
    }
}

/// GET /api/searches/{name}/run
pub async fn preview_search(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let (search, jobs) = match state.tracker.preview(&name).await {
        Ok(found) => found,
        Err(e) => return collector_error(e),
    };
    match state.registry.view(search).await {
        Ok(search) => ok_json(PreviewResponse {
            search,
            results: views(jobs),
        }),
        Err(e) => collector_error(e),
    }
}

/// GET /api/searches/{name}/new
pub async fn new_jobs(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let (search, fresh) = match state.tracker.compute_new_and_mark(&name).await {
        Ok(found) => found,
        Err(e) => return collector_error(e),
    };
    match state.registry.view(search).await {
        Ok(search) => ok_json(NewJobsResponse {
            search,
            new_count: fresh.len(),
            new_jobs: views(fresh),
        }),
        Err(e) => collector_error(e),
    }
}

/// GET /api/searches/{name}/feed
pub async fn search_feed(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return invalid_query(rejection),
    };
    let (search, entries) = match state.tracker.feed(&name, params.limit).await {
        Ok(found) => found,
        Err(e) => return collector_error(e),
    };
    match state.registry.view(search).await {
        Ok(search) => ok_json(FeedResponse {
            search,
            items: entries
                .into_iter()
                .map(|(job, seen)| FeedItem {
                    job: JobView::from(job),
                    seen,
                })
                .collect(),
        }),
        Err(e) => collector_error(e),
    }
}

/// GET /api/searches/{name}/new-count
pub async fn new_count(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return invalid_query(rejection),
    };
    match state.tracker.new_count(&name, params.limit).await {
        Ok((search, new_count)) => ok_json(NewCountResponse {
            name: search.name,
            new_count,
        }),
        Err(e) => collector_error(e),
    }
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DashboardParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return invalid_query(rejection),
    };
    match load_dashboard(state.as_ref(), params).await {
        Ok(body) => ok_json(body),
        Err(e) => collector_error(e),
    }
}

async fn load_dashboard(
    state: &AppState,
    params: DashboardParams,
) -> Result<DashboardResponse, CollectorError> {
    let limit = params
        .limit_jobs
        .unwrap_or(DEFAULT_DASHBOARD_JOBS)
        .min(MAX_SEARCH_LIMIT);
    let searches = state.registry.list_views().await?;
    let latest_jobs = views(state.store.list(limit).await?);
    Ok(DashboardResponse {
        stats: DashboardStats {
            total_jobs: state.store.count().await?,
            search_count: searches.len(),
        },
        searches,
        latest_jobs,
    })
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// POST /api/tasks/searches/{name}/run
pub async fn task_run_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    if let Err(rejection) = require_cron_secret(&state, &headers) {
        return rejection;
    }
    match state.notifier.run_one(&name).await {
        Ok(summary) => ok_json(summary),
        Err(e) => collector_error(e),
    }
}

/// POST /api/tasks/run-all
pub async fn task_run_all(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = require_cron_secret(&state, &headers) {
        return rejection;
    }
    match state.notifier.run_all().await {
        Ok(summary) => ok_json(summary),
        Err(e) => collector_error(e),
    }
}

/// POST /api/tasks/email/test
pub async fn task_email_test(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = require_cron_secret(&state, &headers) {
        return rejection;
    }
    match state.notifier.send_test_email().await {
        Ok(()) => ok_json(serde_json::json!({ "ok": true })),
        Err(e) => collector_error(e),
    }
}
