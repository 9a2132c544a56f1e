//! Domain layer: commands, events, the decision aggregate, and the record
//! projection.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod record;
pub mod status;
