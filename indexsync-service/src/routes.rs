use crate::error::AppError;
use crate::state::{CounterSnapshot, SharedState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use indexsync_core::{EventRecord, Outcome, TypeCollection};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/events", post(post_event))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// POST /events
#[derive(Serialize)]
pub struct EventResponse {
    pub delivery_id: Uuid,
    pub outcome: Outcome,
}

pub async fn post_event(
    State(state): State<SharedState>,
    payload: Result<Json<EventRecord>, JsonRejection>,
) -> Result<Json<EventResponse>, AppError> {
    let Json(record) = payload?;
    let delivery_id = Uuid::new_v4();

    // Handlers do blocking repository and store I/O
    let result = tokio::task::spawn_blocking({
        let state = Arc::clone(&state);
        move || {
            let _span = tracing::info_span!("delivery", %delivery_id).entered();
            state
                .dispatcher
                .consume(&record.routing_key, &record.event)
        }
    })
    .await
    .map_err(AppError::internal)?;

    state.counters.record(&result);
    if let Err(err) = &result {
        tracing::error!(%delivery_id, error = %err, "event failed");
    }

    Ok(Json(EventResponse {
        delivery_id,
        outcome: result?,
    }))
}

// GET /status
#[derive(Serialize)]
pub struct DocumentCounts {
    pub folders: u64,
    pub files: u64,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub events: CounterSnapshot,
    pub documents: DocumentCounts,
}

pub async fn status(State(state): State<SharedState>) -> Result<Json<ServiceStatus>, AppError> {
    let documents = tokio::task::spawn_blocking({
        let state = Arc::clone(&state);
        move || -> indexsync_core::Result<DocumentCounts> {
            let store = state.dispatcher.store();
            Ok(DocumentCounts {
                folders: store.count(TypeCollection::Folder)?,
                files: store.count(TypeCollection::File)?,
            })
        }
    })
    .await
    .map_err(AppError::internal)??;

    Ok(Json(ServiceStatus {
        service: "indexsync-service".to_string(),
        events: state.counters.snapshot(),
        documents,
    }))
}
