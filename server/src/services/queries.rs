use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Availability, SalesTotals};
use crate::store::Repository;
use crate::utils::{TicketError, TicketResult};

/// Read-only aggregation for presentation layers.
#[derive(Clone)]
pub struct QueryFacade {
    repo: Arc<dyn Repository>,
}

impl QueryFacade {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Type, price and available count of every ticket type of an event.
    pub async fn availability(&self, event_id: Uuid) -> TicketResult<Vec<Availability>> {
        let types = self.repo.ticket_types_for_event(event_id).await?;
        Ok(types.iter().map(|t| t.availability()).collect())
    }

    /// Revenue and tickets sold for an event; zero when nothing has sold.
    pub async fn total_sales(&self, event_id: Uuid) -> TicketResult<SalesTotals> {
        let lines = self.repo.sales_for_event(event_id).await?;
        lines
            .iter()
            .try_fold(SalesTotals::default(), |totals, line| totals.checked_add(line))
            .ok_or_else(|| {
                TicketError::invariant(format!("revenue of event {} overflows", event_id))
            })
    }
}
