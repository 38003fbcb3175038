//! Ticket inventory and reservation engine with a thin HTTP front.
//!
//! Units move between three places only: a ticket type's available counter,
//! pending holds, and sales. See [`services`] for the lifecycle.

pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;
