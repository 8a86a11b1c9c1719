use super::AppState;
use super::error::ApiError;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
};
use regid::{
    AllocationStore, Badge, Document, Error, Notifier, Participant, Registration,
    RegistrationNotice, mark_exported,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub participants: Vec<Participant>,
    /// Overrides the `User-Agent` header as the recorded device.
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub registrations: Vec<Registration>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// Registers a batch and, once every participant is committed, sends the
/// primary participant's notice in the background.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let device = request.device.or_else(|| {
        headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    });

    let registrations = state
        .writer()
        .register_batch(&request.participants, device.as_deref(), state.shutdown())
        .await?;

    if let Some(notice) = RegistrationNotice::for_batch(&registrations, state.event_name()) {
        let notifier = state.notifier();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(notice).await {
                tracing::warn!(error = %err, "registration notice not delivered");
            }
        });
    }

    Ok((StatusCode::CREATED, Json(RegisterResponse { registrations })))
}

pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    find(&state, id).await.map(Json)
}

pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let writer = state.writer();
    let document = mark_exported(writer.store(), &id, writer.clock()).await?;
    Ok(Json(document))
}

pub async fn badge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Badge>, ApiError> {
    let document = find(&state, id).await?;
    Ok(Json(Badge::from_document(&document)))
}

async fn find(state: &AppState, id: String) -> Result<Document, ApiError> {
    match state.writer().store().get(&id).await? {
        Some(document) => Ok(document),
        None => Err(Error::NotFound { key: id }.into()),
    }
}
