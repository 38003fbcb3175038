use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::services::BoxOffice;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod admin;
pub mod events;
pub mod sales;
pub mod tickets;

/// Header carrying the caller's identity. Authentication happens upstream.
pub const REQUESTER_HEADER: &str = "x-user-id";

/// Requester recorded when no identity header is present.
pub const GUEST_REQUESTER: &str = "guest";

#[derive(Clone)]
pub struct AppState {
    pub box_office: Arc<BoxOffice>,
}

impl AppState {
    pub fn new(box_office: Arc<BoxOffice>) -> Self {
        Self { box_office }
    }
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "boxoffice-api",
    };

    success(payload, "Health check successful").into_response()
}

pub(crate) fn requester(headers: &HeaderMap) -> String {
    match headers
        .get(REQUESTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(id) => id.to_string(),
        None => {
            tracing::debug!("No {} header, treating caller as guest", REQUESTER_HEADER);
            GUEST_REQUESTER.to_string()
        }
    }
}

/// Unwrap a JSON body, reporting malformed input in the usual error envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}
