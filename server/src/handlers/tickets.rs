use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{json_body, requester, AppState};
use crate::models::{Reservation, Sale};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub event_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub reservation_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub reservation: Reservation,
    pub sale: Sale,
}

pub async fn availability(
    State(state): State<AppState>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(AvailabilityQuery { event_id }) =
        query.map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;
    let availability = state.box_office.availability(event_id).await?;
    Ok(success(availability, "Availability retrieved"))
}

pub async fn reserve(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ReserveRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let requester = requester(&headers);
    let reservation = state
        .box_office
        .reserve(
            request.ticket_type_id,
            request.event_id,
            &requester,
            request.quantity,
        )
        .await?;
    Ok(created(reservation, "Reservation created"))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let reservation = state.box_office.reservation(reservation_id).await?;
    Ok(success(reservation, "Reservation retrieved"))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(reservation_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let requester = requester(&headers);
    let reservation = state
        .box_office
        .cancel(reservation_id, &requester)
        .await?;
    Ok(success(reservation, "Reservation cancelled"))
}

pub async fn purchase(
    State(state): State<AppState>,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let PurchaseRequest { reservation_id } = json_body(payload)?;
    let (reservation, sale) = state.box_office.purchase(reservation_id).await?;
    Ok(created(PurchaseReceipt { reservation, sale }, "Purchase completed"))
}
