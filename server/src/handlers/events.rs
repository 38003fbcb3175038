use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{json_body, AppState};
use crate::models::{EventUpdate, NewEvent};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub unit_price: Decimal,
}

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.box_office.catalog().list_events().await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<Response, AppError> {
    let new_event = json_body(payload)?;
    let details = state.box_office.catalog().create_event(new_event).await?;
    Ok(created(details, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let details = state.box_office.catalog().get_event(event_id).await?;
    Ok(success(details, "Event retrieved"))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    payload: Result<Json<EventUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    let update = json_body(payload)?;
    let details = state
        .box_office
        .catalog()
        .update_event(event_id, update)
        .await?;
    Ok(success(details, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.box_office.catalog().delete_event(event_id).await?;
    Ok(empty_success("Event deleted"))
}

pub async fn update_ticket_price(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<Uuid>,
    payload: Result<Json<PriceUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    let PriceUpdate { unit_price } = json_body(payload)?;
    let ticket_type = state
        .box_office
        .catalog()
        .set_ticket_price(ticket_type_id, unit_price)
        .await?;
    Ok(success(ticket_type, "Ticket price updated"))
}
