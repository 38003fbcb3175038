//! Hold lifecycle.
//!
//! ```text
//!            purchase (now < expires_at)
//!   Pending ────────────────────────────▶ Purchased
//!      │
//!      │ cancel / expire
//!      ▼
//!   Released
//! ```
//!
//! Every transition is a compare-and-set on the reservation record, so of
//! any set of racing purchase/cancel/expire calls exactly one wins. Only the
//! winner of a move into `Released` returns units to the ledger.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ledger::{ensure_positive, InventoryLedger};
use super::sales::SaleRecorder;
use crate::models::{ReleaseReason, Reservation, ReservationStatus, Sale};
use crate::store::{Repository, Transition};
use crate::utils::{Clock, TicketError, TicketResult};

/// What a sweep released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepOutcome {
    pub released_reservations: usize,
    pub released_units: i64,
    /// Holds left `Pending` because expiring them failed.
    pub failed_reservations: usize,
}

pub struct ReservationStore {
    repo: Arc<dyn Repository>,
    ledger: InventoryLedger,
    sales: SaleRecorder,
    clock: Arc<dyn Clock>,
    hold: Duration,
}

impl ReservationStore {
    pub fn new(
        repo: Arc<dyn Repository>,
        ledger: InventoryLedger,
        sales: SaleRecorder,
        clock: Arc<dyn Clock>,
        hold: Duration,
    ) -> Self {
        Self {
            repo,
            ledger,
            sales,
            clock,
            hold,
        }
    }

    /// Place a hold of `quantity` units for `requester`.
    ///
    /// The ledger debit and the record insert form one unit: if the insert
    /// fails the debit is returned before the error is.
    #[instrument(skip(self), fields(ticket_type_id = %ticket_type_id, event_id = %event_id))]
    pub async fn reserve(
        &self,
        ticket_type_id: Uuid,
        event_id: Uuid,
        requester: &str,
        quantity: i32,
    ) -> TicketResult<Reservation> {
        ensure_positive(quantity)?;

        let ticket_type = self.repo.ticket_type(ticket_type_id).await?;
        if ticket_type.map(|t| t.event_id) != Some(event_id) {
            return Err(TicketError::NotFound(format!(
                "Ticket type {} for event {}",
                ticket_type_id, event_id
            )));
        }

        self.ledger.reserve(ticket_type_id, quantity).await?;

        let reservation = Reservation::pending(
            ticket_type_id,
            event_id,
            requester,
            quantity,
            self.clock.now(),
            self.hold,
        );

        if let Err(e) = self.repo.insert_reservation(reservation.clone()).await {
            warn!(error = %e, "Persisting reservation failed, returning units");
            if let Err(compensation) = self.ledger.release(ticket_type_id, quantity).await {
                error!(
                    error = %compensation,
                    quantity,
                    "Compensating release failed; units are leaked"
                );
            }
            return Err(e.into());
        }

        info!(
            reservation_id = %reservation.id,
            quantity,
            expires_at = %reservation.expires_at,
            "Reservation created"
        );
        Ok(reservation)
    }

    pub async fn get(&self, reservation_id: Uuid) -> TicketResult<Reservation> {
        self.repo
            .reservation(reservation_id)
            .await?
            .ok_or_else(|| TicketError::NotFound(format!("Reservation {}", reservation_id)))
    }

    /// Release a pending hold on the requester's behalf.
    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn cancel(&self, reservation_id: Uuid, requester: &str) -> TicketResult<Reservation> {
        let transition = self
            .repo
            .transition_reservation(
                reservation_id,
                ReservationStatus::Pending,
                ReservationStatus::Released,
                Some(ReleaseReason::Cancelled),
            )
            .await?;

        match transition {
            Transition::Applied(reservation) => {
                self.return_units(&reservation).await?;
                info!(quantity = reservation.quantity, "Reservation cancelled");
                Ok(reservation)
            }
            Transition::Conflict(current) => Err(match current.status {
                ReservationStatus::Purchased => TicketError::InvalidState(format!(
                    "reservation {} has been purchased and cannot be cancelled",
                    reservation_id
                )),
                _ => TicketError::InvalidState(format!(
                    "reservation {} is already {}",
                    reservation_id, current.status
                )),
            }),
            Transition::Missing => Err(TicketError::NotFound(format!(
                "Reservation {}",
                reservation_id
            ))),
        }
    }

    /// Convert a pending, unexpired hold into a sale.
    ///
    /// The purchase transition and the sale record are one unit: if the sale
    /// cannot be stored the reservation is put back to `Pending`.
    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn purchase(&self, reservation_id: Uuid) -> TicketResult<(Reservation, Sale)> {
        let now = self.clock.now();
        let current = self.get(reservation_id).await?;

        if current.status.is_terminal() {
            return Err(rejection(&current));
        }
        if !current.is_purchasable_at(now) {
            // The deadline check is the backstop for holds the sweeper has not reached yet.
            self.expire(&current).await?;
            return Err(TicketError::Expired {
                reservation_id,
                expired_at: current.expires_at,
            });
        }

        let transition = self
            .repo
            .transition_reservation(
                reservation_id,
                ReservationStatus::Pending,
                ReservationStatus::Purchased,
                None,
            )
            .await?;

        let purchased = match transition {
            Transition::Applied(reservation) => reservation,
            Transition::Conflict(current) => return Err(rejection(&current)),
            Transition::Missing => {
                return Err(TicketError::NotFound(format!(
                    "Reservation {}",
                    reservation_id
                )))
            }
        };

        match self.sales.record(&purchased, now).await {
            Ok(sale) => Ok((purchased, sale)),
            Err(e) => {
                warn!(error = %e, "Recording sale failed, reverting purchase");
                self.revert_purchase(reservation_id).await;
                Err(e)
            }
        }
    }

    async fn revert_purchase(&self, reservation_id: Uuid) {
        let reverted = self
            .repo
            .transition_reservation(
                reservation_id,
                ReservationStatus::Purchased,
                ReservationStatus::Pending,
                None,
            )
            .await;

        match reverted {
            Ok(Transition::Applied(_)) => debug!("Purchase reverted"),
            Ok(other) => error!(
                outcome = ?other,
                "Purchase could not be reverted; reservation is purchased without a sale"
            ),
            Err(e) => error!(
                error = %e,
                "Purchase could not be reverted; reservation is purchased without a sale"
            ),
        }
    }

    /// Release every pending hold whose deadline lies strictly before `now`.
    ///
    /// Holds that a concurrent cancel or purchase moves first are skipped.
    /// A hold that fails to expire is left `Pending` for the next sweep and
    /// does not stop the rest of the batch.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> TicketResult<SweepOutcome> {
        let candidates = self.repo.expired_pending(now).await?;
        let mut outcome = SweepOutcome::default();

        for reservation in &candidates {
            match self.expire(reservation).await {
                Ok(true) => {
                    outcome.released_reservations += 1;
                    outcome.released_units += i64::from(reservation.quantity);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(reservation_id = %reservation.id, error = %e, "Expiring reservation failed");
                    outcome.failed_reservations += 1;
                }
            }
        }

        if outcome.released_reservations > 0 || outcome.failed_reservations > 0 {
            info!(
                released_reservations = outcome.released_reservations,
                released_units = outcome.released_units,
                failed_reservations = outcome.failed_reservations,
                "Expired reservations swept"
            );
        }
        Ok(outcome)
    }

    /// Credit a freshly released reservation's units back to its ticket type.
    ///
    /// The transition into `Released` and the credit are one unit: when the
    /// credit fails the reservation is moved back to `Pending` so that a later
    /// cancel or sweep can retry. A ticket type that no longer exists has
    /// nowhere to return units to, so the release stands.
    async fn return_units(&self, reservation: &Reservation) -> TicketResult<()> {
        let credited = self
            .ledger
            .release(reservation.ticket_type_id, reservation.quantity)
            .await;

        match credited {
            Ok(_) => Ok(()),
            Err(TicketError::NotFound(what)) => {
                warn!(
                    reservation_id = %reservation.id,
                    "{} is gone, nothing to return",
                    what
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Returning units failed, restoring hold");
                self.restore_pending(reservation.id).await;
                Err(e)
            }
        }
    }

    async fn restore_pending(&self, reservation_id: Uuid) {
        let restored = self
            .repo
            .transition_reservation(
                reservation_id,
                ReservationStatus::Released,
                ReservationStatus::Pending,
                None,
            )
            .await;

        match restored {
            Ok(Transition::Applied(_)) => debug!("Hold restored"),
            Ok(other) => error!(
                outcome = ?other,
                "Hold could not be restored; its units are leaked"
            ),
            Err(e) => error!(
                error = %e,
                "Hold could not be restored; its units are leaked"
            ),
        }
    }

    /// Pending → Released(Expired). Returns whether this call won the transition.
    async fn expire(&self, reservation: &Reservation) -> TicketResult<bool> {
        let transition = self
            .repo
            .transition_reservation(
                reservation.id,
                ReservationStatus::Pending,
                ReservationStatus::Released,
                Some(ReleaseReason::Expired),
            )
            .await?;

        match transition {
            Transition::Applied(expired) => {
                self.return_units(&expired).await?;
                debug!(reservation_id = %expired.id, "Reservation expired");
                Ok(true)
            }
            Transition::Conflict(_) | Transition::Missing => {
                debug!(reservation_id = %reservation.id, "Reservation already settled, skipping");
                Ok(false)
            }
        }
    }
}

/// Error for acting on a reservation that has already left `Pending`.
fn rejection(reservation: &Reservation) -> TicketError {
    match (reservation.status, reservation.release_reason) {
        (ReservationStatus::Released, Some(ReleaseReason::Expired)) => TicketError::Expired {
            reservation_id: reservation.id,
            expired_at: reservation.expires_at,
        },
        (ReservationStatus::Purchased, _) => TicketError::InvalidState(format!(
            "reservation {} has already been purchased",
            reservation.id
        )),
        (status, _) => TicketError::InvalidState(format!(
            "reservation {} is {}",
            reservation.id, status
        )),
    }
}
