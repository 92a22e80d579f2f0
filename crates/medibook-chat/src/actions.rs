//! Side effects requested by router replies.

use tracing::info;

use crate::types::{Action, ActionOutcome};

/// Run an action attached to a reply.
///
/// Notifications are simulated: the outcome is logged and reported back.
pub fn execute_action(action: Option<&Action>) -> ActionOutcome {
    match action {
        Some(Action::NotifyPatient {
            appointment_id,
            date,
            time,
        }) => {
            let message = format!(
                "Notification sent for appointment {} on {} at {}",
                appointment_id,
                date.format("%Y-%m-%d"),
                time.format("%H:%M")
            );
            info!(appointment_id = %appointment_id, "Patient notified");
            ActionOutcome {
                success: true,
                message,
            }
        }
        None => ActionOutcome {
            success: false,
            message: "No action provided".to_string(),
        },
    }
}
