//! Reservations application wiring.
//!
//! Reads configuration from the environment, selects the event store, and
//! builds the [`state::AppState`] the binary drives.

pub mod config;
pub mod error;
pub mod state;
pub mod walkthrough;
