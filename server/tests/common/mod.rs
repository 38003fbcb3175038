#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use boxoffice_server::models::{
    Event, EventUpdate, NewEvent, NewTicketType, ReleaseReason, Reservation,
    ReservationStatus, Sale, SaleLine, TicketType,
};
use boxoffice_server::services::BoxOffice;
use boxoffice_server::store::{LedgerUpdate, MemoryStore, Repository, Transition};
use boxoffice_server::utils::{ManualClock, StoreError, StoreResult};

pub const HOLD_MINUTES: i64 = 15;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub office: Arc<BoxOffice>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<FaultyStore>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = Arc::new(FaultyStore::default());
        let office = Arc::new(BoxOffice::new(
            store.clone(),
            clock.clone(),
            Duration::minutes(HOLD_MINUTES),
        ));
        Self {
            office,
            clock,
            store,
        }
    }

    /// One event with a single ticket type of `total` units at `price`.
    pub async fn event_with(&self, total: i32, price: Decimal) -> (Uuid, Uuid) {
        let details = self
            .office
            .catalog()
            .create_event(new_event(total, &[("General", price, total)]))
            .await
            .unwrap();
        (details.event.id, details.ticket_types[0].id)
    }

    pub async fn available(&self, event_id: Uuid, ticket_type_id: Uuid) -> i32 {
        self.office
            .availability(event_id)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.ticket_type_id == ticket_type_id)
            .map(|a| a.available)
            .unwrap()
    }
}

pub fn new_event(capacity: i32, ticket_types: &[(&str, Decimal, i32)]) -> NewEvent {
    NewEvent {
        name: "Harbour Lights Festival".to_string(),
        venue: "Pier 9".to_string(),
        description: None,
        event_date: start_time() + Duration::days(30),
        capacity,
        ticket_types: ticket_types
            .iter()
            .map(|(label, unit_price, total)| NewTicketType {
                label: label.to_string(),
                unit_price: *unit_price,
                total: *total,
            })
            .collect(),
    }
}

/// `MemoryStore` with switchable write failures, for the compensation paths.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    pub fail_reservation_insert: AtomicBool,
    pub fail_sale_insert: AtomicBool,
    pub fail_expired_scan: AtomicBool,
    failing_credits: Mutex<HashSet<Uuid>>,
}

impl FaultyStore {
    pub fn fail(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    /// Make returning units to `ticket_type_id` fail until switched off.
    pub fn fail_credit(&self, ticket_type_id: Uuid, on: bool) {
        let mut failing = self.failing_credits.lock().unwrap();
        if on {
            failing.insert(ticket_type_id);
        } else {
            failing.remove(&ticket_type_id);
        }
    }

    fn tripped(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {} failure", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for FaultyStore {
    async fn insert_event(&self, event: Event, ticket_types: Vec<TicketType>) -> StoreResult<()> {
        self.inner.insert_event(event, ticket_types).await
    }

    async fn events(&self) -> StoreResult<Vec<Event>> {
        self.inner.events().await
    }

    async fn event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        self.inner.event(id).await
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>> {
        self.inner.update_event(id, update).await
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_event(id).await
    }

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        self.inner.ticket_type(id).await
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        self.inner.ticket_types_for_event(event_id).await
    }

    async fn set_ticket_price(&self, id: Uuid, price: Decimal) -> StoreResult<Option<TicketType>> {
        self.inner.set_ticket_price(id, price).await
    }

    async fn debit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate> {
        self.inner.debit_available(ticket_type_id, quantity).await
    }

    async fn credit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate> {
        if self.failing_credits.lock().unwrap().contains(&ticket_type_id) {
            return Err(StoreError::Unavailable("injected credit failure".to_string()));
        }
        self.inner.credit_available(ticket_type_id, quantity).await
    }

    async fn insert_reservation(&self, reservation: Reservation) -> StoreResult<()> {
        Self::tripped(&self.fail_reservation_insert, "reservation insert")?;
        self.inner.insert_reservation(reservation).await
    }

    async fn reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        self.inner.reservation(id).await
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
        reason: Option<ReleaseReason>,
    ) -> StoreResult<Transition> {
        self.inner.transition_reservation(id, from, to, reason).await
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        Self::tripped(&self.fail_expired_scan, "expiry scan")?;
        self.inner.expired_pending(now).await
    }

    async fn insert_sale(&self, sale: Sale) -> StoreResult<()> {
        Self::tripped(&self.fail_sale_insert, "sale insert")?;
        self.inner.insert_sale(sale).await
    }

    async fn sales_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SaleLine>> {
        self.inner.sales_for_event(event_id).await
    }
}
