use chrono::Duration;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::catalog::Catalog;
use super::ledger::InventoryLedger;
use super::queries::QueryFacade;
use super::reservations::{ReservationStore, SweepOutcome};
use super::sales::SaleRecorder;
use super::sweeper::ExpirySweeper;
use crate::models::{Availability, Reservation, Sale, SalesTotals};
use crate::store::Repository;
use crate::utils::{Clock, TicketResult};

/// Entry point for callers: one instance per process, shared behind an `Arc`.
///
/// Reserve and purchase run an inline sweep first so that lapsed holds are
/// back on sale even when no background sweeper is running.
pub struct BoxOffice {
    catalog: Catalog,
    reservations: Arc<ReservationStore>,
    sweeper: Arc<ExpirySweeper>,
    queries: QueryFacade,
}

impl BoxOffice {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>, hold: Duration) -> Self {
        let ledger = InventoryLedger::new(repo.clone());
        let sales = SaleRecorder::new(repo.clone());
        let reservations = Arc::new(ReservationStore::new(
            repo.clone(),
            ledger,
            sales,
            clock.clone(),
            hold,
        ));
        let sweeper = Arc::new(ExpirySweeper::new(reservations.clone(), clock.clone()));

        Self {
            catalog: Catalog::new(repo.clone(), clock),
            reservations,
            sweeper,
            queries: QueryFacade::new(repo),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn sweeper(&self) -> Arc<ExpirySweeper> {
        self.sweeper.clone()
    }

    pub async fn reserve(
        &self,
        ticket_type_id: Uuid,
        event_id: Uuid,
        requester: &str,
        quantity: i32,
    ) -> TicketResult<Reservation> {
        self.sweep_inline().await;
        self.reservations
            .reserve(ticket_type_id, event_id, requester, quantity)
            .await
    }

    pub async fn purchase(&self, reservation_id: Uuid) -> TicketResult<(Reservation, Sale)> {
        self.sweep_inline().await;
        self.reservations.purchase(reservation_id).await
    }

    pub async fn cancel(&self, reservation_id: Uuid, requester: &str) -> TicketResult<Reservation> {
        self.reservations.cancel(reservation_id, requester).await
    }

    pub async fn reservation(&self, reservation_id: Uuid) -> TicketResult<Reservation> {
        self.reservations.get(reservation_id).await
    }

    pub async fn availability(&self, event_id: Uuid) -> TicketResult<Vec<Availability>> {
        self.queries.availability(event_id).await
    }

    pub async fn total_sales(&self, event_id: Uuid) -> TicketResult<SalesTotals> {
        self.queries.total_sales(event_id).await
    }

    pub async fn sweep(&self) -> TicketResult<SweepOutcome> {
        self.sweeper.sweep_now().await
    }

    // A failed inline sweep must not block the caller; the background
    // sweeper or the purchase deadline check picks the hold up later.
    async fn sweep_inline(&self) {
        if let Err(e) = self.sweeper.sweep_now().await {
            warn!(error = %e, "Inline sweep failed, continuing");
        }
    }
}
