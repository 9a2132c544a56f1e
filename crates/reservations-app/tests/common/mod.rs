//! Shared helpers for app integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use reservations_app::config::{AppConfig, StoreKind};
use reservations_app::state::AppState;
use reservations_core::clock::Clock;
use reservations_core::repository::EventRepository;
use reservations_core::retry::RetryPolicy;
use reservations_test_support::FixedClock;

/// Fixed timestamp used across all integration tests.
pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Configuration with fast retries and a generous timeout.
pub fn test_config() -> AppConfig {
    AppConfig {
        store: StoreKind::Memory,
        retry: RetryPolicy::immediate(3),
        command_timeout: Some(Duration::from_secs(5)),
    }
}

/// Build app state over `events` with the fixed clock.
pub fn build_test_state(events: Arc<dyn EventRepository>) -> AppState {
    AppState::new(events, fixed_clock(), &test_config())
}
