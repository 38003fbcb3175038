use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Event, EventDetails, EventUpdate, NewEvent, TicketType};
use crate::store::Repository;
use crate::utils::{Clock, StoreError, TicketError, TicketResult};

/// Upper bound on a unit price, keeping quantity x price and revenue sums in range.
const MAX_UNIT_PRICE: i64 = 1_000_000_000;

/// Events and their ticket types.
///
/// An event's capacity is a hard ceiling: the totals of its ticket types may
/// never add up to more than it.
#[derive(Clone)]
pub struct Catalog {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl Catalog {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create_event(&self, new: NewEvent) -> TicketResult<EventDetails> {
        require_text("name", &new.name)?;
        require_text("venue", &new.venue)?;
        if new.capacity < 0 {
            return Err(TicketError::InvalidArgument(
                "capacity must not be negative".to_string(),
            ));
        }

        let mut allocated: i64 = 0;
        for ticket_type in &new.ticket_types {
            require_text("ticket type label", &ticket_type.label)?;
            require_price(ticket_type.unit_price)?;
            if ticket_type.total < 0 {
                return Err(TicketError::InvalidArgument(format!(
                    "ticket type '{}' total must not be negative",
                    ticket_type.label
                )));
            }
            allocated += i64::from(ticket_type.total);
        }
        if allocated > i64::from(new.capacity) {
            return Err(TicketError::InvalidArgument(format!(
                "ticket type totals ({}) exceed event capacity ({})",
                allocated, new.capacity
            )));
        }

        let event = Event {
            id: Uuid::new_v4(),
            name: new.name,
            venue: new.venue,
            description: new.description,
            event_date: new.event_date,
            capacity: new.capacity,
            created_at: self.clock.now(),
        };
        let ticket_types: Vec<TicketType> = new
            .ticket_types
            .into_iter()
            .map(|t| TicketType::from_new(event.id, t))
            .collect();

        self.repo
            .insert_event(event.clone(), ticket_types.clone())
            .await?;

        info!(event_id = %event.id, ticket_types = ticket_types.len(), "Event created");
        Ok(EventDetails {
            event,
            ticket_types,
        })
    }

    pub async fn list_events(&self) -> TicketResult<Vec<EventDetails>> {
        let events = self.repo.events().await?;
        let mut details = Vec::with_capacity(events.len());
        for event in events {
            let ticket_types = self.repo.ticket_types_for_event(event.id).await?;
            details.push(EventDetails {
                event,
                ticket_types,
            });
        }
        Ok(details)
    }

    pub async fn get_event(&self, event_id: Uuid) -> TicketResult<EventDetails> {
        let event = self
            .repo
            .event(event_id)
            .await?
            .ok_or_else(|| TicketError::NotFound(format!("Event {}", event_id)))?;
        let ticket_types = self.repo.ticket_types_for_event(event_id).await?;
        Ok(EventDetails {
            event,
            ticket_types,
        })
    }

    /// Change event metadata. Ticket types are never replaced, since live
    /// holds point at them.
    #[instrument(skip(self, update), fields(event_id = %event_id))]
    pub async fn update_event(
        &self,
        event_id: Uuid,
        update: EventUpdate,
    ) -> TicketResult<EventDetails> {
        if let Some(name) = &update.name {
            require_text("name", name)?;
        }
        if let Some(venue) = &update.venue {
            require_text("venue", venue)?;
        }

        let ticket_types = self.repo.ticket_types_for_event(event_id).await?;
        if let Some(capacity) = update.capacity {
            let allocated: i64 = ticket_types.iter().map(|t| i64::from(t.total())).sum();
            if capacity < 0 || i64::from(capacity) < allocated {
                return Err(TicketError::InvalidArgument(format!(
                    "capacity {} is below the ticket type totals ({})",
                    capacity, allocated
                )));
            }
        }

        let event = self
            .repo
            .update_event(event_id, update)
            .await?
            .ok_or_else(|| TicketError::NotFound(format!("Event {}", event_id)))?;

        info!("Event updated");
        Ok(EventDetails {
            event,
            ticket_types,
        })
    }

    /// Remove an event with its ticket types and reservations.
    ///
    /// Sales are append-only, so an event that has sold anything stays. The
    /// store makes that call together with the removal.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn delete_event(&self, event_id: Uuid) -> TicketResult<()> {
        match self.repo.delete_event(event_id).await {
            Ok(true) => {
                info!("Event removed");
                Ok(())
            }
            Ok(false) => Err(TicketError::NotFound(format!("Event {}", event_id))),
            Err(StoreError::Referenced(what)) => Err(TicketError::InvalidState(format!(
                "{} and cannot be removed",
                what
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Set the unit price used by future purchases.
    #[instrument(skip(self), fields(ticket_type_id = %ticket_type_id))]
    pub async fn set_ticket_price(
        &self,
        ticket_type_id: Uuid,
        unit_price: Decimal,
    ) -> TicketResult<TicketType> {
        require_price(unit_price)?;
        self.repo
            .set_ticket_price(ticket_type_id, unit_price)
            .await?
            .ok_or_else(|| TicketError::NotFound(format!("Ticket type {}", ticket_type_id)))
    }
}

fn require_text(field: &str, value: &str) -> TicketResult<()> {
    if value.trim().is_empty() {
        return Err(TicketError::InvalidArgument(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn require_price(price: Decimal) -> TicketResult<()> {
    if price < Decimal::ZERO {
        return Err(TicketError::InvalidArgument(format!(
            "unit price must not be negative, got {}",
            price
        )));
    }
    if price > Decimal::from(MAX_UNIT_PRICE) {
        return Err(TicketError::InvalidArgument(format!(
            "unit price must not exceed {}, got {}",
            MAX_UNIT_PRICE, price
        )));
    }
    Ok(())
}
