//! Drives one reservation through its whole lifecycle.
//!
//! Create, confirm, cancel, then attempt a second confirmation that the
//! cancelled reservation must refuse. Every step is read back through the
//! query side.

use reservations_booking::application::command_handlers::{
    handle_cancel_reservation, handle_confirm_reservation, handle_create_reservation,
};
use reservations_booking::application::query_handlers::{ReservationView, get_reservation_by_id};
use reservations_booking::domain::commands::{
    CancelReservation, ConfirmReservation, CreateReservation,
};
use reservations_core::error::DomainError;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// What the walkthrough observed.
#[derive(Debug, Serialize)]
pub struct WalkthroughReport {
    /// The reservation that was driven.
    pub reservation_id: Uuid,
    /// The reservation as read back after each accepted command.
    pub snapshots: Vec<ReservationView>,
    /// Why the final confirmation was refused.
    pub rejection: String,
}

/// Runs the lifecycle for a fresh `reservation_id`.
///
/// # Errors
///
/// Returns `AppError::Domain` if any step fails, including the final
/// confirmation being accepted when it should have been refused.
#[instrument(skip(state))]
pub async fn run(
    state: &AppState,
    reservation_id: Uuid,
    number: &str,
) -> Result<WalkthroughReport, AppError> {
    let repo = &state.repository;
    let mut snapshots = Vec::with_capacity(3);

    handle_create_reservation(
        &CreateReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
            number: number.to_owned(),
        },
        repo,
    )
    .await?;
    snapshots.push(snapshot(state, reservation_id).await?);

    handle_confirm_reservation(
        &ConfirmReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        },
        repo,
    )
    .await?;
    snapshots.push(snapshot(state, reservation_id).await?);

    handle_cancel_reservation(
        &CancelReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        },
        repo,
    )
    .await?;
    snapshots.push(snapshot(state, reservation_id).await?);

    let late_confirm = handle_confirm_reservation(
        &ConfirmReservation {
            correlation_id: Uuid::new_v4(),
            reservation_id,
        },
        repo,
    )
    .await;
    let rejection = match late_confirm {
        Err(err @ DomainError::InvalidTransition { .. }) => err.to_string(),
        Err(err) => return Err(err.into()),
        Ok(_) => {
            return Err(DomainError::InvariantViolation(format!(
                "cancelled reservation {reservation_id} accepted a confirmation"
            ))
            .into());
        }
    };
    info!(%rejection, "late confirmation refused");

    Ok(WalkthroughReport {
        reservation_id,
        snapshots,
        rejection,
    })
}

async fn snapshot(state: &AppState, reservation_id: Uuid) -> Result<ReservationView, AppError> {
    let view = get_reservation_by_id(reservation_id, state.events()).await?;
    info!(status = %view.status, version = view.version, "reservation read back");
    Ok(view)
}
