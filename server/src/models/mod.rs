pub mod event;
pub mod reservation;
pub mod sale;
pub mod ticket;

pub use event::{Event, EventDetails, EventUpdate, NewEvent};
pub use reservation::{ReleaseReason, Reservation, ReservationStatus};
pub use sale::{Sale, SaleLine, SalesTotals};
pub use ticket::{Availability, NewTicketType, TicketType};
