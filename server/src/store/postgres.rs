use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use super::{LedgerUpdate, Repository, Transition};
use crate::models::{
    Event, EventUpdate, ReleaseReason, Reservation, ReservationStatus, Sale, SaleLine, TicketType,
};
use crate::utils::{StoreError, StoreResult};

const EVENT_COLUMNS: &str = "id, name, venue, description, event_date, capacity, created_at";
const TICKET_TYPE_COLUMNS: &str = "id, event_id, label, unit_price, total, available";
const RESERVATION_COLUMNS: &str = "id, ticket_type_id, event_id, requester, quantity, created_at, \
     expires_at, status, release_reason";

/// Postgres-backed store. Counter and status changes are single conditional
/// `UPDATE ... RETURNING` statements, so row-level locking provides the
/// per-entity serialization.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ReservationRow {
    id: Uuid,
    ticket_type_id: Uuid,
    event_id: Uuid,
    requester: String,
    quantity: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: String,
    release_reason: Option<String>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ReservationStatus>()
            .map_err(StoreError::Corrupt)?;
        let release_reason = row
            .release_reason
            .map(|reason| reason.parse::<ReleaseReason>())
            .transpose()
            .map_err(StoreError::Corrupt)?;

        Ok(Reservation {
            id: row.id,
            ticket_type_id: row.ticket_type_id,
            event_id: row.event_id,
            requester: row.requester,
            quantity: row.quantity,
            created_at: row.created_at,
            expires_at: row.expires_at,
            status,
            release_reason,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("Successfully connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        tracing::info!("Migrations run successfully");
        Ok(())
    }

    async fn counts(&self, ticket_type_id: Uuid) -> StoreResult<LedgerUpdate> {
        let counts: Option<(i32, i32)> =
            sqlx::query_as("SELECT available, total FROM ticket_types WHERE id = $1")
                .bind(ticket_type_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match counts {
            Some((available, total)) => LedgerUpdate::Rejected { available, total },
            None => LedgerUpdate::Missing,
        })
    }
}

#[async_trait]
impl Repository for PgStore {
    async fn insert_event(&self, event: Event, ticket_types: Vec<TicketType>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO events (id, name, venue, description, event_date, capacity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.venue)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(event.capacity)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        for ticket_type in &ticket_types {
            sqlx::query(
                "INSERT INTO ticket_types (id, event_id, label, unit_price, total, available) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(ticket_type.id)
            .bind(ticket_type.event_id)
            .bind(&ticket_type.label)
            .bind(ticket_type.unit_price)
            .bind(ticket_type.total)
            .bind(ticket_type.available)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn events(&self) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY event_date"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET \
                 name = COALESCE($2, name), \
                 venue = COALESCE($3, venue), \
                 description = COALESCE($4, description), \
                 event_date = COALESCE($5, event_date), \
                 capacity = COALESCE($6, capacity) \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.venue)
        .bind(update.description)
        .bind(update.event_date)
        .bind(update.capacity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    StoreError::Referenced(format!("event {} has recorded sales", id))
                }
                other => StoreError::from(other),
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        let ticket_type = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket_type)
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        let types = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE event_id = $1 ORDER BY label"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    async fn set_ticket_price(&self, id: Uuid, price: Decimal) -> StoreResult<Option<TicketType>> {
        let ticket_type = sqlx::query_as::<_, TicketType>(&format!(
            "UPDATE ticket_types SET unit_price = $2 WHERE id = $1 RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(id)
        .bind(price)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket_type)
    }

    async fn debit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate> {
        let applied: Option<i32> = sqlx::query_scalar(
            "UPDATE ticket_types SET available = available - $2 \
             WHERE id = $1 AND available >= $2 RETURNING available",
        )
        .bind(ticket_type_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        match applied {
            Some(available) => Ok(LedgerUpdate::Applied(available)),
            None => self.counts(ticket_type_id).await,
        }
    }

    async fn credit_available(
        &self,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> StoreResult<LedgerUpdate> {
        let applied: Option<i32> = sqlx::query_scalar(
            "UPDATE ticket_types SET available = available + $2 \
             WHERE id = $1 AND available + $2 <= total RETURNING available",
        )
        .bind(ticket_type_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        match applied {
            Some(available) => Ok(LedgerUpdate::Applied(available)),
            None => self.counts(ticket_type_id).await,
        }
    }

    async fn insert_reservation(&self, reservation: Reservation) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(reservation.id)
        .bind(reservation.ticket_type_id)
        .bind(reservation.event_id)
        .bind(&reservation.requester)
        .bind(reservation.quantity)
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .bind(reservation.status.as_str())
        .bind(reservation.release_reason.map(|r| r.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Reservation::try_from)
        .transpose()
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
        reason: Option<ReleaseReason>,
    ) -> StoreResult<Transition> {
        let updated = sqlx::query_as::<_, ReservationRow>(&format!(
            "UPDATE reservations SET status = $3, release_reason = $4 \
             WHERE id = $1 AND status = $2 RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reason.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(Transition::Applied(row.try_into()?));
        }

        Ok(match self.reservation(id).await? {
            Some(current) => Transition::Conflict(current),
            None => Transition::Missing,
        })
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'pending' AND expires_at < $1 ORDER BY expires_at"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }

    async fn insert_sale(&self, sale: Sale) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sales (id, event_id, reservation_id, total_price, purchased_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(sale.id)
        .bind(sale.event_id)
        .bind(sale.reservation_id)
        .bind(sale.total_price)
        .bind(sale.purchased_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate(
                format!("sale for reservation {}", sale.reservation_id),
            ),
            other => StoreError::from(other),
        })?;
        Ok(())
    }

    async fn sales_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            "SELECT s.id, s.event_id, s.reservation_id, s.total_price, s.purchased_at, r.quantity \
             FROM sales s JOIN reservations r ON r.id = s.reservation_id \
             WHERE s.event_id = $1 ORDER BY s.purchased_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }
}
