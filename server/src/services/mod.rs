//! The reservation engine.
//!
//! Leaf-first: [`InventoryLedger`] owns the available counters,
//! [`ReservationStore`] drives the hold lifecycle on top of it,
//! [`ExpirySweeper`] releases abandoned holds, [`SaleRecorder`] turns purchases
//! into sales and [`QueryFacade`] aggregates for readers. [`BoxOffice`] wires
//! them together for the HTTP layer.

mod box_office;
pub mod catalog;
pub mod ledger;
pub mod queries;
pub mod reservations;
pub mod sales;
pub mod sweeper;

pub use box_office::BoxOffice;
pub use catalog::Catalog;
pub use ledger::InventoryLedger;
pub use queries::QueryFacade;
pub use reservations::{ReservationStore, SweepOutcome};
pub use sales::SaleRecorder;
pub use sweeper::ExpirySweeper;

/// Default hold duration for a reservation, in seconds.
pub const DEFAULT_HOLD_SECS: i64 = 15 * 60;
