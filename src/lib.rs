pub mod audit;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;

pub use engine::{Engine, EngineError, ReservationFilter, Verdict, Viewer};
pub use model::{
    CalendarEvent, Details, Event, Requester, Reservation, ResourceType, Status, TimeRange,
};
