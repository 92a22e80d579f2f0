//! Booking dialogue state machine with validated transitions.
//!
//! Forward path:
//! Idle -> AwaitingSpecialty -> AwaitingDate -> AwaitingTime -> Confirm
//! Confirm -> AwaitingSpecialty (restart), Confirm -> AwaitingTime (slot taken),
//! any non-idle state -> Idle.

use medibook_core::types::BookingState;

use crate::error::ChatError;

/// Validate that a booking state transition is allowed.
///
/// Staying in the same state is not a transition and is never written.
pub fn validate_transition(from: BookingState, to: BookingState) -> Result<(), ChatError> {
    use BookingState::*;

    let valid = matches!(
        (from, to),
        (Idle, AwaitingSpecialty)
            | (AwaitingSpecialty, AwaitingDate)
            | (AwaitingDate, AwaitingTime)
            | (AwaitingTime, Confirm)
            | (Confirm, AwaitingSpecialty)
            | (Confirm, AwaitingTime)
            | (AwaitingSpecialty | AwaitingDate | AwaitingTime | Confirm, Idle)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition { from, to })
    }
}
