//! Internal event injection.
use crate::api::error::{ApiError, api_internal, api_not_found};
use crate::api::types::EventAccepted;
use crate::app::AppState;
use crate::events::TOPICS;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;

/// Enqueue a raw payload on one of the consumed topics. Payload validation
/// happens in the consumer, exactly as for messages from the bus.
pub(crate) async fn publish_event(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<EventAccepted>), ApiError> {
    if !TOPICS.contains(&topic.as_str()) {
        return Err(api_not_found("unknown topic"));
    }
    let message_id = state
        .queue
        .publish(&topic, body.to_vec())
        .await
        .map_err(|err| api_internal("failed to enqueue event", &err))?;
    Ok((StatusCode::ACCEPTED, Json(EventAccepted { topic, message_id })))
}
