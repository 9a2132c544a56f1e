//! Booking bounded context.
//!
//! Responsible for the reservation lifecycle: creating a reservation,
//! confirming it, and cancelling it. Decisions are pure; the application
//! layer loads history, folds it into a record, decides, and appends with an
//! optimistic-concurrency check.

pub mod application;
pub mod domain;
