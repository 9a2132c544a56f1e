//! Application layer: repository orchestration, command handlers, and query
//! handlers.

pub mod command_handlers;
pub mod query_handlers;
pub mod repository;
