use crate::models::{AppState, JobStatus, PagingResult, ScanFilter, SortDir, SortField};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use problemdetails::Problem;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/jobs", get(scan))
        .route("/jobs/count", get(count))
        .route("/jobs/:id", get(get_by_id))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct ScanParams {
    connection: Option<String>,
    queue: Option<String>,
    status: Option<JobStatus>,
    name_contains: Option<String>,
    started_after: Option<DateTime<Utc>>,
    started_before: Option<DateTime<Utc>>,
    sort: Option<SortField>,
    order: Option<SortDir>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl ScanParams {
    fn filter(&self) -> ScanFilter {
        ScanFilter {
            connection: self.connection.clone(),
            queue: self.queue.clone(),
            status: self.status,
            name_contains: self.name_contains.clone(),
            started_after: self.started_after,
            started_before: self.started_before,
        }
    }
}

async fn scan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanParams>,
) -> Result<impl IntoResponse, Problem> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0).max(0);
    let field = params.sort.unwrap_or_default();
    let dir = params.order.unwrap_or_default();
    let filter = params.filter();
    let data = state.store.scan(&filter, field, dir, limit, offset).await?;
    let total = state.store.count(Some(&filter)).await?;
    Ok(Json(PagingResult {
        limit,
        offset,
        total,
        data,
    }))
}

#[derive(Serialize)]
struct CountResult {
    count: i64,
}

/// Unfiltered store size, polled by the navigation badge.
async fn count(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, Problem> {
    let count = state.store.count(None).await?;
    Ok(Json(CountResult { count }))
}

async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, Problem> {
    let record = state.store.get(&id).await?;
    match record {
        None => Ok(StatusCode::NO_CONTENT.into_response()),
        Some(o) => Ok(Json(o).into_response()),
    }
}
