//!JSON endpoints for readings, reminders and alerts.
//!
//!Every POST stores the record under its subject. Environment, text and health readings are run through
//!the alert rules before the response goes out, so a client that reads `/api/alerts` right after a POST
//!sees whatever that POST raised.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use nest_core::{
    reading::{EnvironmentIn, HealthIn, ReminderIn, Submission, TextLogIn},
    Alert, Environment, Health, Rated, Reminder, SubjectId, TextLog,
};
use nest_store::{acknowledge_alert, commit_reading, Record, Store, Stored};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{error::ApiError, server::state::AppState};

pub(crate) fn apply<S: Store>(router: Router<AppState<S>>) -> Router<AppState<S>> {
    router
        .route("/", get(status))
        .route(
            "/api/environment",
            post(create_rated::<S, EnvironmentIn>).get(list::<S, Environment>),
        )
        .route(
            "/api/textlog",
            post(create_rated::<S, TextLogIn>).get(list::<S, TextLog>),
        )
        .route(
            "/api/health",
            post(create_rated::<S, HealthIn>).get(list::<S, Health>),
        )
        .route(
            "/api/reminder",
            post(create_plain::<S, ReminderIn>).get(list::<S, Reminder>),
        )
        .route("/api/alerts", get(list::<S, Alert>))
        .route("/api/alerts/:id/ack", post(acknowledge::<S>))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubjectQuery {
    child_id: Option<String>,
}

async fn status() -> Json<Value> {
    Json(json!({ "ok": true, "msg": "remote-care backend running (video mode)" }))
}

async fn create_rated<S, I>(
    State(state): State<AppState<S>>,
    Json(input): Json<I>,
) -> Result<Json<Stored<I::Record>>, ApiError>
where
    S: Store,
    I: Submission + DeserializeOwned + Send,
    I::Record: Rated + Record,
{
    let (subject, record) = input.into_record()?;
    let committed = commit_reading(&state.store, &subject, record).await?;
    Ok(Json(committed.reading))
}

async fn create_plain<S, I>(
    State(state): State<AppState<S>>,
    Json(input): Json<I>,
) -> Result<Json<Stored<I::Record>>, ApiError>
where
    S: Store,
    I: Submission + DeserializeOwned + Send,
    I::Record: Record,
{
    let (subject, record) = input.into_record()?;
    let stored = state.store.create(&subject, record).await?;
    debug!("stored {} #{} for {}", <I::Record as Record>::TABLE, stored.id, subject);
    Ok(Json(stored))
}

async fn list<S: Store, T: Record>(
    State(state): State<AppState<S>>,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<Vec<Stored<T>>>, ApiError> {
    let subject = SubjectId::normalize(query.child_id.as_deref());
    Ok(Json(state.store.list::<T>(&subject).await?))
}

async fn acknowledge<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let response = match acknowledge_alert(&state.store, id).await? {
        Some(alert) => Json(json!({ "ok": true, "alert": alert })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "msg": "alert not found" })),
        )
            .into_response(),
    };
    Ok(response)
}
