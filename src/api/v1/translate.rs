//! Translate endpoint handler

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use tracing::info;

use crate::api::middleware::Tenant;
use crate::api::state::AppState;
use crate::api::types::{ApiError, TranslateRequest, ValidatedJson};
use crate::domain::translate::TranslateEvent;

/// POST /v1/translate
pub async fn translate(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    ValidatedJson(request): ValidatedJson<TranslateRequest>,
) -> Result<Response, ApiError> {
    request
        .check_direction()
        .map_err(|e| ApiError::from(e).with_param("direction"))?;

    info!(
        tenant = %tenant,
        stream = request.stream,
        direction = ?request.direction,
        content_chars = request.content.chars().count(),
        "Processing translate request"
    );

    if request.stream {
        let events = state
            .agent
            .translate_stream(&tenant, request.into_input())
            .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let result = state.agent.translate(&tenant, request.into_input()).await?;
    Ok(Json(result).into_response())
}

/// Event name is the tag, data is the JSON payload
fn to_sse_event(event: &TranslateEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}
