//! Storage backends for the box office.
//!
//! The engine only relies on single-record atomic operations: conditional
//! counter updates on a ticket type and compare-and-set transitions on a
//! reservation. Multi-record consistency (debit + insert, purchase + sale) is
//! handled by the services through compensation.
//!
//! - **Memory**: `DashMap` per entity kind, single process
//! - **Postgres**: conditional `UPDATE ... RETURNING` through sqlx

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Event, EventUpdate, ReleaseReason, Reservation, ReservationStatus, Sale, SaleLine, TicketType,
};
use crate::utils::StoreResult;

/// Result of a conditional update of a ticket type's available counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// The update was applied; carries the new available count.
    Applied(i32),
    /// The precondition failed; nothing changed. Carries the current count.
    Rejected { available: i32, total: i32 },
    /// No ticket type with that id.
    Missing,
}

/// Result of a compare-and-set on a reservation's status.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The reservation was in the expected state and now holds the new one.
    Applied(Reservation),
    /// The reservation was not in the expected state; carries it unchanged.
    Conflict(Reservation),
    Missing,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Persist an event and its ticket types as one unit.
    async fn insert_event(&self, event: Event, ticket_types: Vec<TicketType>) -> StoreResult<()>;

    async fn events(&self) -> StoreResult<Vec<Event>>;

    async fn event(&self, id: Uuid) -> StoreResult<Option<Event>>;

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>>;

    /// Remove an event with its ticket types and reservations.
    ///
    /// Returns `Ok(false)` when the event does not exist, and
    /// `StoreError::Referenced` while the event has sales or purchased
    /// reservations.
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>>;

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>>;

    async fn set_ticket_price(&self, id: Uuid, price: Decimal) -> StoreResult<Option<TicketType>>;

    /// Subtract `quantity` from `available` if and only if `available >= quantity`.
    async fn debit_available(&self, ticket_type_id: Uuid, quantity: i32)
        -> StoreResult<LedgerUpdate>;

    /// Add `quantity` to `available` if and only if the result stays `<= total`.
    async fn credit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate>;

    async fn insert_reservation(&self, reservation: Reservation) -> StoreResult<()>;

    async fn reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>>;

    /// Atomically move a reservation from `from` to `to`.
    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
        reason: Option<ReleaseReason>,
    ) -> StoreResult<Transition>;

    /// Pending reservations whose deadline lies strictly before `now`.
    async fn expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>>;

    /// Insert a sale; a second sale for the same reservation is `StoreError::Duplicate`.
    async fn insert_sale(&self, sale: Sale) -> StoreResult<()>;

    async fn sales_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SaleLine>>;
}
