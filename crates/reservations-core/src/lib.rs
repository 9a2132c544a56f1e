//! Shared domain abstractions for the reservations workspace.
//!
//! This crate defines the fundamental traits and types that every bounded
//! context depends on: commands, events, aggregates, the event repository
//! seam, and the retry policy that governs optimistic-concurrency retries.
//! It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
pub mod retry;
