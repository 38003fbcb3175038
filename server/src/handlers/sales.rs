use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use super::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn total_sales(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let totals = state.box_office.total_sales(event_id).await?;
    Ok(success(totals, "Sales totals retrieved"))
}
