use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::store::{LedgerUpdate, Repository};
use crate::utils::{TicketError, TicketResult};

/// Sole owner of the per-ticket-type available counter.
///
/// Both operations are single conditional updates in the store, which makes
/// the check and the write one indivisible step per ticket type.
#[derive(Clone)]
pub struct InventoryLedger {
    repo: Arc<dyn Repository>,
}

impl InventoryLedger {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Take `quantity` units out of the pool. Returns the new available count.
    #[instrument(skip(self), fields(ticket_type_id = %ticket_type_id))]
    pub async fn reserve(&self, ticket_type_id: Uuid, quantity: i32) -> TicketResult<i32> {
        ensure_positive(quantity)?;

        match self.repo.debit_available(ticket_type_id, quantity).await? {
            LedgerUpdate::Applied(available) => {
                debug!(quantity, available, "Units reserved");
                Ok(available)
            }
            LedgerUpdate::Rejected { available, .. } => Err(TicketError::InsufficientInventory {
                ticket_type_id,
                requested: quantity,
                available,
            }),
            LedgerUpdate::Missing => Err(TicketError::NotFound(format!(
                "Ticket type {}",
                ticket_type_id
            ))),
        }
    }

    /// Return `quantity` units to the pool. Returns the new available count.
    ///
    /// A release that would push the counter above the ticket type's total
    /// means the units were never reserved or were already returned.
    #[instrument(skip(self), fields(ticket_type_id = %ticket_type_id))]
    pub async fn release(&self, ticket_type_id: Uuid, quantity: i32) -> TicketResult<i32> {
        ensure_positive(quantity)?;

        match self.repo.credit_available(ticket_type_id, quantity).await? {
            LedgerUpdate::Applied(available) => {
                debug!(quantity, available, "Units released");
                Ok(available)
            }
            LedgerUpdate::Rejected { available, total } => Err(TicketError::invariant(format!(
                "release of {} units on ticket type {} would exceed capacity ({} of {} available)",
                quantity, ticket_type_id, available, total
            ))),
            LedgerUpdate::Missing => Err(TicketError::NotFound(format!(
                "Ticket type {}",
                ticket_type_id
            ))),
        }
    }
}

pub(crate) fn ensure_positive(quantity: i32) -> TicketResult<()> {
    if quantity <= 0 {
        return Err(TicketError::InvalidArgument(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}
