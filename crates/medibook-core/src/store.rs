//! Persistence collaborator contracts.
//!
//! The chat core never caches records between calls: every operation reads
//! through these traits and writes back through them. Implementations own
//! identifier generation and storage format.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::Result;
use crate::types::{
    Appointment, BookingState, ChatMessage, ChatRole, NewAppointment, PendingBooking, User,
};

/// Lock slots are pruned once the map grows past this many idle entries.
const PRUNE_THRESHOLD: usize = 1024;

/// User records and their booking sessions.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user, or `None` when the identifier is unknown.
    fn get(&self, user_id: &str) -> Result<Option<User>>;

    /// Overwrite the booking state and pending fields of a user.
    ///
    /// Fails with `UserNotFound` for an unknown identifier.
    fn set_state(
        &self,
        user_id: &str,
        state: BookingState,
        pending: &PendingBooking,
    ) -> Result<()>;

    /// Register a new idle user. Fails with `UserExists` on a duplicate id.
    fn create(&self, user_id: &str, name: &str) -> Result<User>;

    /// Acquire the exclusive read-modify-write scope for one user.
    ///
    /// Two leases for the same identifier never coexist; the scope ends when
    /// the lease is dropped.
    async fn lock(&self, user_id: &str) -> UserLease;
}

/// Appointment records.
pub trait AppointmentStore: Send + Sync {
    /// Persist an appointment and return its generated identifier.
    ///
    /// Saving the same booking twice returns the first id. A different
    /// booking in a slot the user already holds fails with `SlotTaken`.
    fn save(&self, appointment: &NewAppointment) -> Result<String>;

    /// All appointments of a user, in a stable order.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<Appointment>>;
}

/// Append-only per-user message log.
pub trait ChatLog: Send + Sync {
    fn append(
        &self,
        user_id: &str,
        role: ChatRole,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// The full log of a user in chronological order.
    fn recent(&self, user_id: &str) -> Result<Vec<ChatMessage>>;

    /// Drop every message of a user.
    fn clear(&self, user_id: &str) -> Result<()>;
}

// =============================================================================
// Per-user exclusive scope
// =============================================================================

/// Exclusive access to one user's records, released on drop.
#[derive(Debug)]
pub struct UserLease {
    user_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl UserLease {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Registry of per-user async mutexes.
#[derive(Debug, Default)]
pub struct UserLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lease of `user_id`.
    pub async fn acquire(&self, user_id: &str) -> UserLease {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.len() > PRUNE_THRESHOLD {
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            Arc::clone(
                slots
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let guard = slot.lock_owned().await;
        UserLease {
            user_id: user_id.to_string(),
            _guard: guard,
        }
    }
}
