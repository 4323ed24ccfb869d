use crate::models::{AppState, IngestEvent};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use problemdetails::Problem;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", post(submit))
        .with_state(state)
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Json(event): Json<IngestEvent>,
) -> Result<Response, Problem> {
    let record = state.ingestor.ingest(&state.store, event).await?;
    Ok((StatusCode::ACCEPTED, Json(record)).into_response())
}
