use axum::{
    extract::{rejection::JsonRejection, MatchedPath, State},
    Json,
};
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    api::types::{
        BodyFields, ContextRequest, HealthResponse, ModifyRequest, PostResponse, StatusResponse,
    },
    api::{AppState, ENDPOINTS},
    error::ApiError,
    inference::Availability,
    prompts::{PromptKind, PromptVars},
};

const LOG_PREVIEW_CHARS: usize = 50;

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let available = state.infer.availability().await.is_available();

    Json(StatusResponse {
        status: "API is running",
        ollama_available: available,
        model: state.model.to_string(),
        endpoints: ENDPOINTS.to_vec(),
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn generate_post(
    State(state): State<AppState>,
    route: MatchedPath,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    from_context(&state, payload, PromptKind::Generate, "generating")
        .await
        .inspect_err(|err| err.log(route.as_str()))
}

pub async fn regenerate_post(
    State(state): State<AppState>,
    route: MatchedPath,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    from_context(&state, payload, PromptKind::Regenerate, "regenerating")
        .await
        .inspect_err(|err| err.log(route.as_str()))
}

pub async fn modify_post(
    State(state): State<AppState>,
    route: MatchedPath,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    modify(&state, payload)
        .await
        .inspect_err(|err| err.log(route.as_str()))
}

async fn from_context(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
    kind: PromptKind,
    activity: &'static str,
) -> Result<Json<PostResponse>, ApiError> {
    let fields = BodyFields::from_payload(payload)?;
    let req = ContextRequest::from_fields(&fields)?;
    ensure_available(state).await?;

    info!(
        target = "api",
        context = %preview(&req.context),
        "{activity} LinkedIn post"
    );
    let post = write_post(state, kind, &PromptVars::context(&req.context), activity).await?;

    Ok(Json(PostResponse { post }))
}

async fn modify(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let fields = BodyFields::from_payload(payload)?;
    let req = ModifyRequest::from_fields(&fields)?;
    ensure_available(state).await?;

    info!(
        target = "api",
        action = %req.action,
        post = %preview(&req.current_post),
        "modifying LinkedIn post"
    );
    let post = write_post(
        state,
        req.action.prompt_kind(),
        &PromptVars::post(&req.current_post, &req.context),
        "modifying",
    )
    .await?;

    Ok(Json(PostResponse { post }))
}

async fn ensure_available(state: &AppState) -> Result<(), ApiError> {
    match state.infer.availability().await {
        Availability::Available => Ok(()),
        Availability::Unavailable(cause) => Err(ApiError::BackendUnavailable(cause)),
    }
}

async fn write_post(
    state: &AppState,
    kind: PromptKind,
    vars: &PromptVars<'_>,
    activity: &'static str,
) -> Result<String, ApiError> {
    let request_id = Uuid::new_v4();
    let prompt = state.prompts.render(kind, vars)?;
    debug!(
        target = "api",
        %request_id,
        template = kind.name(),
        prompt_chars = prompt.chars().count(),
        "invoking backend"
    );

    match state.infer.generate(&prompt).await {
        Ok(text) => Ok(text.trim().to_string()),
        Err(source) => {
            error!(
                target = "api",
                %request_id,
                template = kind.name(),
                error = %source,
                "error {activity} LinkedIn post"
            );
            Err(ApiError::Generation { activity, source })
        }
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    if text.chars().nth(LOG_PREVIEW_CHARS).is_some() {
        out.push_str("...");
    }
    out
}
