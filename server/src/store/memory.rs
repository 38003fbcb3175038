//! In-memory store
//!
//! Uses DashMap for thread-safe concurrent access. Every conditional update
//! runs under the guard of the single entry it touches, so operations on
//! unrelated ticket types or reservations do not contend on a global lock.
//! Pending deadlines are kept in a separate ordered index, updated while the
//! reservation's guard is held, so sweeps never walk settled history.
//! Suitable for single-instance deployments and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{LedgerUpdate, Repository, Transition};
use crate::models::{
    Event, EventUpdate, ReleaseReason, Reservation, ReservationStatus, Sale, SaleLine, TicketType,
};
use crate::utils::{StoreError, StoreResult};

pub struct MemoryStore {
    events: DashMap<Uuid, Event>,
    ticket_types: DashMap<Uuid, TicketType>,
    reservations: DashMap<Uuid, Reservation>,
    /// Keyed by reservation id, which makes the one-sale-per-reservation rule structural.
    sales: DashMap<Uuid, Sale>,
    /// `(expires_at, id)` of every `Pending` reservation.
    pending: Mutex<BTreeSet<(DateTime<Utc>, Uuid)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        debug!("Creating new in-memory box office store");
        Self {
            events: DashMap::new(),
            ticket_types: DashMap::new(),
            reservations: DashMap::new(),
            sales: DashMap::new(),
            pending: Mutex::new(BTreeSet::new()),
        }
    }

    fn pending_index(&self) -> std::sync::MutexGuard<'_, BTreeSet<(DateTime<Utc>, Uuid)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unindex_all(&self, removed: &[(DateTime<Utc>, Uuid)]) {
        let mut pending = self.pending_index();
        for key in removed {
            pending.remove(key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn insert_event(&self, event: Event, ticket_types: Vec<TicketType>) -> StoreResult<()> {
        match self.events.entry(event.id) {
            Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!("event {}", event.id)));
            }
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
        }
        for ticket_type in ticket_types {
            self.ticket_types.insert(ticket_type.id, ticket_type);
        }
        Ok(())
    }

    async fn events(&self) -> StoreResult<Vec<Event>> {
        let mut events: Vec<Event> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| e.event_date);
        Ok(events)
    }

    async fn event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.events.get(&id).map(|e| e.value().clone()))
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>> {
        Ok(self.events.get_mut(&id).map(|mut event| {
            event.apply(update);
            event.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        if !self.events.contains_key(&id) {
            return Ok(false);
        }

        let purchased = self
            .reservations
            .iter()
            .any(|r| r.event_id == id && r.status == ReservationStatus::Purchased);
        if purchased || self.sales.iter().any(|s| s.event_id == id) {
            return Err(StoreError::Referenced(format!(
                "event {} has recorded sales",
                id
            )));
        }

        if self.events.remove(&id).is_none() {
            return Ok(false);
        }
        self.ticket_types.retain(|_, t| t.event_id != id);
        // A purchase that lands after the check above keeps its record.
        let mut removed = Vec::new();
        self.reservations.retain(|reservation_id, r| {
            let drop = r.event_id == id && r.status != ReservationStatus::Purchased;
            if drop {
                removed.push((r.expires_at, *reservation_id));
            }
            !drop
        });
        self.unindex_all(&removed);
        Ok(true)
    }

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        Ok(self.ticket_types.get(&id).map(|t| t.value().clone()))
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        let mut types: Vec<TicketType> = self
            .ticket_types
            .iter()
            .filter(|t| t.event_id == event_id)
            .map(|t| t.value().clone())
            .collect();
        types.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(types)
    }

    async fn set_ticket_price(&self, id: Uuid, price: Decimal) -> StoreResult<Option<TicketType>> {
        Ok(self.ticket_types.get_mut(&id).map(|mut t| {
            t.unit_price = price;
            t.clone()
        }))
    }

    async fn debit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate> {
        let Some(mut ticket_type) = self.ticket_types.get_mut(&ticket_type_id) else {
            return Ok(LedgerUpdate::Missing);
        };

        if ticket_type.available >= quantity {
            ticket_type.available -= quantity;
            trace!(ticket_type_id = %ticket_type_id, available = ticket_type.available, "Debited");
            Ok(LedgerUpdate::Applied(ticket_type.available))
        } else {
            Ok(LedgerUpdate::Rejected {
                available: ticket_type.available,
                total: ticket_type.total,
            })
        }
    }

    async fn credit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate> {
        let Some(mut ticket_type) = self.ticket_types.get_mut(&ticket_type_id) else {
            return Ok(LedgerUpdate::Missing);
        };

        match ticket_type.available.checked_add(quantity) {
            Some(next) if next <= ticket_type.total => {
                ticket_type.available = next;
                trace!(ticket_type_id = %ticket_type_id, available = next, "Credited");
                Ok(LedgerUpdate::Applied(next))
            }
            _ => Ok(LedgerUpdate::Rejected {
                available: ticket_type.available,
                total: ticket_type.total,
            }),
        }
    }

    async fn insert_reservation(&self, reservation: Reservation) -> StoreResult<()> {
        match self.reservations.entry(reservation.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "reservation {}",
                reservation.id
            ))),
            Entry::Vacant(slot) => {
                if reservation.status == ReservationStatus::Pending {
                    self.pending_index()
                        .insert((reservation.expires_at, reservation.id));
                }
                slot.insert(reservation);
                Ok(())
            }
        }
    }

    async fn reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.value().clone()))
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
        reason: Option<ReleaseReason>,
    ) -> StoreResult<Transition> {
        let Some(mut reservation) = self.reservations.get_mut(&id) else {
            return Ok(Transition::Missing);
        };

        if reservation.status != from {
            return Ok(Transition::Conflict(reservation.clone()));
        }

        reservation.status = to;
        reservation.release_reason = reason;

        let key = (reservation.expires_at, reservation.id);
        match (from, to) {
            (ReservationStatus::Pending, ReservationStatus::Pending) => {}
            (ReservationStatus::Pending, _) => {
                self.pending_index().remove(&key);
            }
            (_, ReservationStatus::Pending) => {
                self.pending_index().insert(key);
            }
            _ => {}
        }
        Ok(Transition::Applied(reservation.clone()))
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        let due: Vec<Uuid> = self
            .pending_index()
            .range(..(now, Uuid::nil()))
            .map(|(_, id)| *id)
            .collect();

        Ok(due
            .into_iter()
            .filter_map(|id| self.reservations.get(&id).map(|r| r.value().clone()))
            .filter(|r| r.is_expired_at(now))
            .collect())
    }

    async fn insert_sale(&self, sale: Sale) -> StoreResult<()> {
        match self.sales.entry(sale.reservation_id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "sale for reservation {}",
                sale.reservation_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(sale);
                Ok(())
            }
        }
    }

    async fn sales_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SaleLine>> {
        let sales: Vec<Sale> = self
            .sales
            .iter()
            .filter(|s| s.event_id == event_id)
            .map(|s| s.value().clone())
            .collect();

        sales
            .into_iter()
            .map(|sale| {
                let quantity = self
                    .reservations
                    .get(&sale.reservation_id)
                    .map(|r| r.quantity)
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "sale {} references missing reservation {}",
                            sale.id, sale.reservation_id
                        ))
                    })?;
                Ok(SaleLine { sale, quantity })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTicketType;
    use chrono::Duration;

    async fn seeded(total: i32) -> (MemoryStore, TicketType) {
        let store = MemoryStore::new();
        let event = Event {
            id: Uuid::new_v4(),
            name: "Night Shift".to_string(),
            venue: "Hall A".to_string(),
            description: None,
            event_date: Utc::now() + Duration::days(30),
            capacity: total,
            created_at: Utc::now(),
        };
        let ticket_type = TicketType::from_new(
            event.id,
            NewTicketType {
                label: "Floor".to_string(),
                unit_price: Decimal::new(2500, 2),
                total,
            },
        );
        store
            .insert_event(event, vec![ticket_type.clone()])
            .await
            .unwrap();
        (store, ticket_type)
    }

    #[tokio::test]
    async fn test_debit_rejects_without_side_effect() {
        let (store, ticket_type) = seeded(3).await;

        assert_eq!(
            store.debit_available(ticket_type.id, 2).await.unwrap(),
            LedgerUpdate::Applied(1)
        );
        assert_eq!(
            store.debit_available(ticket_type.id, 2).await.unwrap(),
            LedgerUpdate::Rejected {
                available: 1,
                total: 3
            }
        );
        assert_eq!(
            store.ticket_type(ticket_type.id).await.unwrap().unwrap().available(),
            1
        );
    }

    #[tokio::test]
    async fn test_credit_never_exceeds_total() {
        let (store, ticket_type) = seeded(3).await;

        assert_eq!(
            store.credit_available(ticket_type.id, 1).await.unwrap(),
            LedgerUpdate::Rejected {
                available: 3,
                total: 3
            }
        );
        store.debit_available(ticket_type.id, 2).await.unwrap();
        assert_eq!(
            store.credit_available(ticket_type.id, 2).await.unwrap(),
            LedgerUpdate::Applied(3)
        );
        assert_eq!(
            store.credit_available(Uuid::new_v4(), 1).await.unwrap(),
            LedgerUpdate::Missing
        );
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let (store, ticket_type) = seeded(3).await;
        let reservation = Reservation::pending(
            ticket_type.id,
            ticket_type.event_id,
            "bob",
            1,
            Utc::now(),
            Duration::minutes(15),
        );
        store.insert_reservation(reservation.clone()).await.unwrap();

        let first = store
            .transition_reservation(
                reservation.id,
                ReservationStatus::Pending,
                ReservationStatus::Released,
                Some(ReleaseReason::Cancelled),
            )
            .await
            .unwrap();
        assert!(matches!(first, Transition::Applied(ref r) if r.status == ReservationStatus::Released));

        let second = store
            .transition_reservation(
                reservation.id,
                ReservationStatus::Pending,
                ReservationStatus::Purchased,
                None,
            )
            .await
            .unwrap();
        match second {
            Transition::Conflict(current) => {
                assert_eq!(current.status, ReservationStatus::Released);
                assert_eq!(current.release_reason, Some(ReleaseReason::Cancelled));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_sale_for_reservation_is_duplicate() {
        let (store, ticket_type) = seeded(3).await;
        let reservation_id = Uuid::new_v4();
        let sale = |id| Sale {
            id,
            event_id: ticket_type.event_id,
            reservation_id,
            total_price: Decimal::new(2500, 2),
            purchased_at: Utc::now(),
        };

        store.insert_sale(sale(Uuid::new_v4())).await.unwrap();
        let err = store.insert_sale(sale(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_delete_event_cascades_to_types_and_reservations() {
        let (store, ticket_type) = seeded(3).await;
        let reservation = Reservation::pending(
            ticket_type.id,
            ticket_type.event_id,
            "carol",
            1,
            Utc::now(),
            Duration::minutes(15),
        );
        store.insert_reservation(reservation.clone()).await.unwrap();

        assert!(store.delete_event(ticket_type.event_id).await.unwrap());
        assert!(store.ticket_type(ticket_type.id).await.unwrap().is_none());
        assert!(store.reservation(reservation.id).await.unwrap().is_none());
        assert!(!store.delete_event(ticket_type.event_id).await.unwrap());
        let later = Utc::now() + Duration::days(1);
        assert!(store.expired_pending(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_event_refused_while_a_purchase_is_in_flight() {
        let (store, ticket_type) = seeded(3).await;
        let reservation = Reservation::pending(
            ticket_type.id,
            ticket_type.event_id,
            "dave",
            1,
            Utc::now(),
            Duration::minutes(15),
        );
        store.insert_reservation(reservation.clone()).await.unwrap();
        store
            .transition_reservation(
                reservation.id,
                ReservationStatus::Pending,
                ReservationStatus::Purchased,
                None,
            )
            .await
            .unwrap();

        let err = store.delete_event(ticket_type.event_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Referenced(_)));
        let kept = store.reservation(reservation.id).await.unwrap().unwrap();
        assert_eq!(kept.status, ReservationStatus::Purchased);
        assert!(store.ticket_type(ticket_type.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_pending_reads_only_open_holds() {
        let (store, ticket_type) = seeded(5).await;
        let start = Utc::now();
        let hold = |minutes| {
            Reservation::pending(
                ticket_type.id,
                ticket_type.event_id,
                "erin",
                1,
                start,
                Duration::minutes(minutes),
            )
        };
        let early = hold(5);
        let settled = hold(5);
        let late = hold(60);
        for r in [&early, &settled, &late] {
            store.insert_reservation(r.clone()).await.unwrap();
        }
        store
            .transition_reservation(
                settled.id,
                ReservationStatus::Pending,
                ReservationStatus::Purchased,
                None,
            )
            .await
            .unwrap();

        let at = start + Duration::minutes(10);
        let due: Vec<Uuid> = store
            .expired_pending(at)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(due, vec![early.id]);

        store
            .transition_reservation(
                settled.id,
                ReservationStatus::Purchased,
                ReservationStatus::Pending,
                None,
            )
            .await
            .unwrap();
        let mut due: Vec<Uuid> = store
            .expired_pending(at)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        due.sort();
        let mut expected = vec![early.id, settled.id];
        expected.sort();
        assert_eq!(due, expected);
    }
}
