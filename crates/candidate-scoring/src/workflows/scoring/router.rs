use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::context::ContextStore;
use super::domain::ScoringRequest;
use super::envelope::{decode_envelope, PushEnvelope};
use super::publisher::EventBus;
use super::repository::{ResultStore, ScoreQuery, StoreError, MAX_QUERY_LIMIT};
use super::scorer::ScorerClient;
use super::service::{ErrorKind, PipelineError, RescoreError, ScoringOrchestrator};

/// Router exposing push intake, direct triggers, and result lookups.
pub fn scoring_router<C, S, R, B>(orchestrator: Arc<ScoringOrchestrator<C, S, R, B>>) -> Router
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    Router::new()
        .route("/process-candidate", post(process_candidate_handler::<C, S, R, B>))
        .route("/score", post(trigger_handler::<C, S, R, B>))
        .route("/re-score/:application_id", post(rescore_handler::<C, S, R, B>))
        .route("/scores", get(query_handler::<C, S, R, B>))
        .route("/scores/:application_id", get(result_handler::<C, S, R, B>))
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkspaceParams {
    workspace_id: String,
}

/// Body of a direct scoring trigger.
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub workspace_id: String,
    pub candidate_reference_id: String,
    pub vacancy_reference_id: String,
    pub application_id: String,
}

impl From<TriggerRequest> for ScoringRequest {
    fn from(value: TriggerRequest) -> Self {
        ScoringRequest {
            application_id: value.application_id,
            candidate_id: value.candidate_reference_id,
            vacancy_id: value.vacancy_reference_id,
            workspace_id: value.workspace_id,
        }
    }
}

pub(crate) async fn process_candidate_handler<C, S, R, B>(
    State(orchestrator): State<Arc<ScoringOrchestrator<C, S, R, B>>>,
    payload: Result<Json<PushEnvelope>, JsonRejection>,
) -> Response
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    let decoded = match payload {
        Ok(Json(envelope)) => decode_envelope(&envelope).map_err(|err| err.to_string()),
        Err(rejection) => Err(rejection.body_text()),
    };

    let event = match decoded {
        Ok(event) => event,
        Err(reason) => {
            warn!("acknowledging undecodable message: {}", reason);
            let payload = json!({
                "status": "skipped",
                "reason": "invalid message format",
            });
            return (StatusCode::OK, Json(payload)).into_response();
        }
    };

    info!(
        event_name = %event.event_name,
        workspace_id = %event.workspace_id,
        message_id = %event.message_id,
        applications = event.requests.len(),
        "processing scoring event"
    );

    let mut results = Vec::with_capacity(event.requests.len());
    for request in event.requests {
        match orchestrator.score(request).await {
            Ok(outcome) => results.push(json!({
                "application_id": outcome.result.application_id,
                "score": outcome.result.score,
                "published": outcome.published,
            })),
            Err(err) => return pipeline_failure(&err),
        }
    }

    let payload = json!({
        "status": "ok",
        "results": results,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn trigger_handler<C, S, R, B>(
    State(orchestrator): State<Arc<ScoringOrchestrator<C, S, R, B>>>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Response
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    let request = match payload {
        Ok(Json(trigger)) => ScoringRequest::from(trigger),
        Err(rejection) => return unprocessable(rejection.body_text()),
    };

    match orchestrator.score(request).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.result)).into_response(),
        Err(err) if err.kind() == ErrorKind::InvalidInput => unprocessable(err.to_string()),
        Err(err) => pipeline_failure(&err),
    }
}

pub(crate) async fn rescore_handler<C, S, R, B>(
    State(orchestrator): State<Arc<ScoringOrchestrator<C, S, R, B>>>,
    Path(application_id): Path<String>,
    params: Result<Query<WorkspaceParams>, QueryRejection>,
) -> Response
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    let workspace_id = match workspace_from(params) {
        Ok(workspace_id) => workspace_id,
        Err(response) => return response,
    };

    match orchestrator.rescore(&workspace_id, &application_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.result)).into_response(),
        Err(err @ RescoreError::NoPriorResult { .. }) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(RescoreError::Pipeline(err)) => pipeline_failure(&err),
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn result_handler<C, S, R, B>(
    State(orchestrator): State<Arc<ScoringOrchestrator<C, S, R, B>>>,
    Path(application_id): Path<String>,
    params: Result<Query<WorkspaceParams>, QueryRejection>,
) -> Response
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    let workspace_id = match workspace_from(params) {
        Ok(workspace_id) => workspace_id,
        Err(response) => return response,
    };

    match orchestrator.result(&workspace_id, &application_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(StoreError::NotFound) => {
            let payload = json!({
                "error": format!("no score for application {application_id}"),
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn query_handler<C, S, R, B>(
    State(orchestrator): State<Arc<ScoringOrchestrator<C, S, R, B>>>,
    params: Result<Query<ScoreQuery>, QueryRejection>,
) -> Response
where
    C: ContextStore + 'static,
    S: ScorerClient + 'static,
    R: ResultStore + 'static,
    B: EventBus + 'static,
{
    let query = match params {
        Ok(Query(query)) => query,
        Err(rejection) => return unprocessable(rejection.body_text()),
    };
    if query.workspace_id.trim().is_empty() {
        return unprocessable("workspace_id must not be blank".to_string());
    }
    if !query.limit_in_range() {
        return unprocessable(format!("limit must be between 1 and {MAX_QUERY_LIMIT}"));
    }

    match orchestrator.results(&query).await {
        Ok(results) => {
            let payload = json!({
                "count": results.len(),
                "results": results,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn workspace_from(params: Result<Query<WorkspaceParams>, QueryRejection>) -> Result<String, Response> {
    match params {
        Ok(Query(WorkspaceParams { workspace_id })) if !workspace_id.trim().is_empty() => {
            Ok(workspace_id)
        }
        Ok(_) => Err(unprocessable("workspace_id must not be blank".to_string())),
        Err(rejection) => Err(unprocessable(rejection.body_text())),
    }
}

fn unprocessable(message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

/// Failed runs answer 500 so push delivery retries them.
fn pipeline_failure(err: &PipelineError) -> Response {
    let payload = json!({
        "error": err.to_string(),
        "stage": err.stage.as_str(),
        "retryable": err.is_retryable(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}
