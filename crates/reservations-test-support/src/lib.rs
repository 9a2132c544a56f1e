//! Shared test doubles for the reservations workspace.

mod clock;
mod repository;

pub use clock::FixedClock;
pub use repository::{
    ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    RecordingEventRepository, RendezvousEventRepository,
};
