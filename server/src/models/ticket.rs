use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A class of ticket for one event.
///
/// `total` and `available` are only readable from outside the crate; the
/// available counter is moved exclusively by the inventory ledger through the
/// store's conditional updates.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub label: String,
    pub unit_price: Decimal,
    pub(crate) total: i32,
    pub(crate) available: i32,
}

impl TicketType {
    pub(crate) fn from_new(event_id: Uuid, new: NewTicketType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            label: new.label,
            unit_price: new.unit_price,
            total: new.total,
            available: new.total,
        }
    }

    pub fn total(&self) -> i32 {
        self.total
    }

    pub fn available(&self) -> i32 {
        self.available
    }

    pub fn availability(&self) -> Availability {
        Availability {
            ticket_type_id: self.id,
            label: self.label.clone(),
            unit_price: self.unit_price,
            available: self.available,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicketType {
    pub label: String,
    pub unit_price: Decimal,
    pub total: i32,
}

/// Availability projection of a single ticket type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub ticket_type_id: Uuid,
    pub label: String,
    pub unit_price: Decimal,
    pub available: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ticket_type_starts_fully_available() {
        let event_id = Uuid::new_v4();
        let ticket_type = TicketType::from_new(
            event_id,
            NewTicketType {
                label: "Balcony".to_string(),
                unit_price: Decimal::new(4550, 2),
                total: 120,
            },
        );

        assert_eq!(ticket_type.event_id, event_id);
        assert_eq!(ticket_type.total(), 120);
        assert_eq!(ticket_type.available(), 120);

        let availability = ticket_type.availability();
        assert_eq!(availability.label, "Balcony");
        assert_eq!(availability.unit_price, Decimal::new(4550, 2));
        assert_eq!(availability.available, 120);
    }
}
