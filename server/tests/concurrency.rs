mod common;

use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Barrier;
use tokio::task::JoinSet;

use boxoffice_server::models::ReservationStatus;
use boxoffice_server::utils::TicketError;
use common::{Harness, HOLD_MINUTES};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_reserves_never_oversell() {
    let h = Harness::new();
    let (event_id, ticket_type_id) = h.event_with(50, Decimal::new(10, 0)).await;

    let barrier = Arc::new(Barrier::new(120));
    let mut tasks = JoinSet::new();
    for i in 0..120 {
        let office = h.office.clone();
        let barrier = barrier.clone();
        tasks.spawn(async move {
            barrier.wait().await;
            office
                .reserve(ticket_type_id, event_id, &format!("fan-{}", i), 1)
                .await
        });
    }

    let mut granted = 0;
    let mut refused = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => granted += 1,
            Err(TicketError::InsufficientInventory { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(granted, 50);
    assert_eq!(refused, 70);
    assert_eq!(h.available(event_id, ticket_type_id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_mixed_reserve_and_cancel_stay_within_bounds() {
    let h = Harness::new();
    let (event_id, ticket_type_id) = h.event_with(30, Decimal::new(10, 0)).await;

    let mut tasks = JoinSet::new();
    for i in 0..60 {
        let office = h.office.clone();
        tasks.spawn(async move {
            let requester = format!("fan-{}", i);
            let quantity = (i % 3) + 1;
            if let Ok(reservation) = office
                .reserve(ticket_type_id, event_id, &requester, quantity)
                .await
            {
                if i % 2 == 0 {
                    office.cancel(reservation.id, &requester).await.unwrap();
                    return 0;
                }
                return quantity;
            }
            0
        });
    }

    let mut held = 0;
    while let Some(joined) = tasks.join_next().await {
        held += joined.unwrap();
    }

    let available = h.available(event_id, ticket_type_id).await;
    assert!((0..=30).contains(&available));
    assert_eq!(available + held, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_purchase_and_cancel_race_has_one_winner() {
    let h = Harness::new();
    let (event_id, ticket_type_id) = h.event_with(200, Decimal::new(10, 0)).await;

    for round in 0..25 {
        let requester = format!("racer-{}", round);
        let reservation = h
            .office
            .reserve(ticket_type_id, event_id, &requester, 2)
            .await
            .unwrap();

        let buyer = h.office.clone();
        let canceller = h.office.clone();
        let id = reservation.id;
        let purchase = tokio::spawn(async move { buyer.purchase(id).await });
        let cancel = tokio::spawn(async move { canceller.cancel(id, &requester).await });

        let purchased = purchase.await.unwrap().is_ok();
        let cancelled = cancel.await.unwrap().is_ok();
        assert!(purchased ^ cancelled, "round {}: exactly one must win", round);

        let settled = h.office.reservation(id).await.unwrap();
        let expected = if purchased {
            ReservationStatus::Purchased
        } else {
            ReservationStatus::Released
        };
        assert_eq!(settled.status, expected);
    }

    let totals = h.office.total_sales(event_id).await.unwrap();
    let sold = i32::try_from(totals.total_tickets_sold).unwrap();
    assert_eq!(h.available(event_id, ticket_type_id).await, 200 - sold);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_expired_hold_is_released_once_under_contention() {
    let h = Harness::new();
    let (event_id, ticket_type_id) = h.event_with(40, Decimal::new(10, 0)).await;

    let mut ids = Vec::new();
    for i in 0..10 {
        let reservation = h
            .office
            .reserve(ticket_type_id, event_id, &format!("late-{}", i), 4)
            .await
            .unwrap();
        ids.push(reservation.id);
    }
    assert_eq!(h.available(event_id, ticket_type_id).await, 0);
    h.clock.advance(Duration::minutes(HOLD_MINUTES) + Duration::seconds(1));

    let mut tasks = JoinSet::new();
    for id in ids.iter().copied() {
        let office = h.office.clone();
        tasks.spawn(async move { office.purchase(id).await.map(|_| ()) });
        let office = h.office.clone();
        tasks.spawn(async move { office.cancel(id, "late").await.map(|_| ()) });
        let office = h.office.clone();
        tasks.spawn(async move { office.sweep().await.map(|_| ()) });
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined.unwrap() {
            assert!(
                matches!(e, TicketError::Expired { .. } | TicketError::InvalidState(_)),
                "unexpected error: {}",
                e
            );
        }
    }

    for id in ids {
        let settled = h.office.reservation(id).await.unwrap();
        assert_eq!(settled.status, ReservationStatus::Released);
    }
    assert_eq!(h.available(event_id, ticket_type_id).await, 40);
    assert_eq!(h.office.total_sales(event_id).await.unwrap().total_tickets_sold, 0);
}
