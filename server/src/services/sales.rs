use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Reservation, ReservationStatus, Sale};
use crate::store::Repository;
use crate::utils::{StoreError, TicketError, TicketResult};

/// Turns purchased reservations into immutable sales.
#[derive(Clone)]
pub struct SaleRecorder {
    repo: Arc<dyn Repository>,
}

impl SaleRecorder {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Record the sale for a reservation the store has already moved to `Purchased`.
    ///
    /// The price is captured from the ticket type as it stands now; later
    /// price changes never touch the recorded total.
    #[instrument(skip(self, reservation), fields(reservation_id = %reservation.id))]
    pub async fn record(
        &self,
        reservation: &Reservation,
        purchased_at: DateTime<Utc>,
    ) -> TicketResult<Sale> {
        if reservation.status != ReservationStatus::Purchased {
            return Err(TicketError::InvalidState(format!(
                "reservation {} is {}, not purchased",
                reservation.id, reservation.status
            )));
        }

        let ticket_type = self
            .repo
            .ticket_type(reservation.ticket_type_id)
            .await?
            .ok_or_else(|| {
                TicketError::NotFound(format!("Ticket type {}", reservation.ticket_type_id))
            })?;

        let total_price = ticket_type
            .unit_price
            .checked_mul(Decimal::from(reservation.quantity))
            .ok_or_else(|| {
                TicketError::InvalidArgument(format!(
                    "total price of {} x {} is out of range",
                    reservation.quantity, ticket_type.unit_price
                ))
            })?;

        let sale = Sale {
            id: Uuid::new_v4(),
            event_id: reservation.event_id,
            reservation_id: reservation.id,
            total_price,
            purchased_at,
        };

        match self.repo.insert_sale(sale.clone()).await {
            Ok(()) => {
                info!(sale_id = %sale.id, total_price = %sale.total_price, "Sale recorded");
                Ok(sale)
            }
            Err(StoreError::Duplicate(what)) => Err(TicketError::invariant(format!(
                "{} already exists",
                what
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
