use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::create_cors_layer;
use crate::handlers::{admin, events, health_check, sales, tickets, AppState};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer()),
        )
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/ticket-types/:id/price",
            put(events::update_ticket_price),
        )
        .route("/tickets/availability", get(tickets::availability))
        .route("/tickets/reservation", post(tickets::reserve))
        .route("/tickets/reservation/:id", get(tickets::get_reservation))
        .route(
            "/tickets/reservations/:id",
            delete(tickets::cancel_reservation),
        )
        .route("/tickets/purchases", post(tickets::purchase))
        .route("/sales/totals/:event_id", get(sales::total_sales))
        .route("/admin/sweep", post(admin::sweep_expired))
}
