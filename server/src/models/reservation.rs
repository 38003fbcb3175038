use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a hold. `Pending` is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Purchased,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Purchased => "purchased",
            ReservationStatus::Released => "released",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "purchased" => Ok(ReservationStatus::Purchased),
            "released" => Ok(ReservationStatus::Released),
            other => Err(format!("unknown reservation status '{}'", other)),
        }
    }
}

/// Why a reservation left `Pending` without being purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseReason {
    Cancelled,
    Expired,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Cancelled => "cancelled",
            ReleaseReason::Expired => "expired",
        }
    }
}

impl FromStr for ReleaseReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancelled" => Ok(ReleaseReason::Cancelled),
            "expired" => Ok(ReleaseReason::Expired),
            other => Err(format!("unknown release reason '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub event_id: Uuid,
    pub requester: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub release_reason: Option<ReleaseReason>,
}

impl Reservation {
    pub fn pending(
        ticket_type_id: Uuid,
        event_id: Uuid,
        requester: impl Into<String>,
        quantity: i32,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_type_id,
            event_id,
            requester: requester.into(),
            quantity,
            created_at: now,
            expires_at: now + hold,
            status: ReservationStatus::Pending,
            release_reason: None,
        }
    }

    /// A hold can be purchased strictly before its deadline.
    pub fn is_purchasable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && now < self.expires_at
    }

    /// Sweep eligibility: strictly past the deadline.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at < now
    }
}
