use axum::extract::State;
use axum::response::Response;

use super::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Run an expiry sweep immediately instead of waiting for the timer.
pub async fn sweep_expired(State(state): State<AppState>) -> Result<Response, AppError> {
    let outcome = state.box_office.sweep().await?;
    Ok(success(outcome, "Sweep completed"))
}
