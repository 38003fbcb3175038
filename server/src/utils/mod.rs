pub mod clock;
pub mod error;
pub mod response;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AppError, StoreError, StoreResult, TicketError, TicketResult};
