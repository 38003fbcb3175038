use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use super::reservations::{ReservationStore, SweepOutcome};
use crate::utils::{Clock, TicketResult};

/// Releases holds whose deadline has passed.
///
/// Sweeping is idempotent, so it runs both inline before availability
/// sensitive operations and on an optional background timer.
pub struct ExpirySweeper {
    reservations: Arc<ReservationStore>,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub fn new(reservations: Arc<ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reservations,
            clock,
        }
    }

    pub async fn sweep_now(&self) -> TicketResult<SweepOutcome> {
        self.reservations.sweep_expired(self.clock.now()).await
    }

    /// Sweep every `period` until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "Expiry sweeper started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep_now().await {
                            error!("Error sweeping expired reservations: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Expiry sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, NewTicketType, TicketType};
    use crate::services::{InventoryLedger, SaleRecorder};
    use crate::store::{MemoryStore, Repository};
    use crate::utils::ManualClock;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_background_sweep_releases_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let event = Event {
            id: Uuid::new_v4(),
            name: "Matinee".to_string(),
            venue: "Studio 2".to_string(),
            description: None,
            event_date: Utc::now(),
            capacity: 10,
            created_at: Utc::now(),
        };
        let ticket_type = TicketType::from_new(
            event.id,
            NewTicketType {
                label: "Seat".to_string(),
                unit_price: Decimal::ONE,
                total: 10,
            },
        );
        store
            .insert_event(event.clone(), vec![ticket_type.clone()])
            .await
            .unwrap();

        let reservations = Arc::new(ReservationStore::new(
            store.clone(),
            InventoryLedger::new(store.clone()),
            SaleRecorder::new(store.clone()),
            clock.clone(),
            chrono::Duration::minutes(15),
        ));
        reservations
            .reserve(ticket_type.id, event.id, "night-owl", 4)
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(16));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = Arc::new(ExpirySweeper::new(reservations, clock));
        let handle = sweeper.spawn(Duration::from_millis(10), shutdown_rx);

        let mut available = 0;
        for _ in 0..100 {
            available = store
                .ticket_type(ticket_type.id)
                .await
                .unwrap()
                .unwrap()
                .available();
            if available == 10 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(available, 10);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
