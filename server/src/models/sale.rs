use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable record of a completed purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub event_id: Uuid,
    pub reservation_id: Uuid,
    /// Quantity times the unit price in force at purchase time.
    pub total_price: Decimal,
    pub purchased_at: DateTime<Utc>,
}

/// A sale joined with the quantity of the reservation it settled.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SaleLine {
    #[sqlx(flatten)]
    pub sale: Sale,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesTotals {
    pub total_revenue: Decimal,
    pub total_tickets_sold: i64,
}

impl SalesTotals {
    /// Fold one sale in; `None` when the revenue would leave `Decimal`'s range.
    pub fn checked_add(self, line: &SaleLine) -> Option<Self> {
        Some(Self {
            total_revenue: self.total_revenue.checked_add(line.sale.total_price)?,
            total_tickets_sold: self
                .total_tickets_sold
                .checked_add(i64::from(line.quantity))?,
        })
    }
}
