//! Repository implementations for SQLite-backed persistence.
//!
//! Provides UserRepository, AppointmentRepository and ChatLogRepository,
//! implementing the collaborator traits from `medibook_core::store`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use medibook_core::error::MedibookError;
use medibook_core::store::{AppointmentStore, ChatLog, UserLease, UserLocks, UserStore};
use medibook_core::types::{
    hhmm, Appointment, AppointmentStatus, BookingState, ChatMessage, ChatRole, NewAppointment,
    PendingBooking, User,
};

use crate::db::Database;

// =============================================================================
// Users
// =============================================================================

/// Repository for users and their booking sessions.
pub struct UserRepository {
    db: Arc<Database>,
    locks: UserLocks,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            locks: UserLocks::new(),
        }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    fn get(&self, user_id: &str) -> Result<Option<User>, MedibookError> {
        self.db.with_conn(|conn| {
            let raw = conn
                .query_row(
                    "SELECT user_id, name, created_at, state, pending FROM users WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| MedibookError::Storage(e.to_string()))?;

            Ok(raw.map(|(user_id, name, created_at, state, pending)| {
                decode_user(user_id, name, created_at, &state, &pending)
            }))
        })
    }

    fn set_state(
        &self,
        user_id: &str,
        state: BookingState,
        pending: &PendingBooking,
    ) -> Result<(), MedibookError> {
        // Pending data never survives a return to idle.
        let pending_json = if state.is_idle() {
            "{}".to_string()
        } else {
            serde_json::to_string(pending)?
        };

        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE users SET state = ?1, pending = ?2 WHERE user_id = ?3",
                    rusqlite::params![state.to_string(), pending_json, user_id],
                )
                .map_err(|e| MedibookError::Storage(format!("Failed to update user: {}", e)))?;
            if changed == 0 {
                return Err(MedibookError::UserNotFound(user_id.to_string()));
            }
            Ok(())
        })
    }

    fn create(&self, user_id: &str, name: &str) -> Result<User, MedibookError> {
        let created_at = Utc::now();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, name, created_at, state, pending)
                 VALUES (?1, ?2, ?3, 'idle', '{}')",
                rusqlite::params![user_id, name, created_at.timestamp_millis()],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    MedibookError::UserExists(user_id.to_string())
                }
                other => MedibookError::Storage(format!("Failed to create user: {}", other)),
            })?;
            Ok(())
        })?;

        info!(user_id = %user_id, "User registered");
        Ok(User {
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: from_millis(created_at.timestamp_millis()),
            state: BookingState::Idle,
            pending: PendingBooking::default(),
        })
    }

    async fn lock(&self, user_id: &str) -> UserLease {
        self.locks.acquire(user_id).await
    }
}

fn decode_user(user_id: String, name: String, created_at: i64, state: &str, pending: &str) -> User {
    let state = match state.parse::<BookingState>() {
        Ok(s) => s,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Resetting unrecognised booking state");
            BookingState::Idle
        }
    };
    let pending = if state.is_idle() {
        PendingBooking::default()
    } else {
        serde_json::from_str(pending).unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "Discarding unreadable pending booking");
            PendingBooking::default()
        })
    };
    User {
        user_id,
        name,
        created_at: from_millis(created_at),
        state,
        pending,
    }
}

// =============================================================================
// Appointments
// =============================================================================

/// Repository for confirmed appointments.
pub struct AppointmentRepository {
    db: Arc<Database>,
}

impl AppointmentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl AppointmentStore for AppointmentRepository {
    /// Insert an appointment, or return the existing id when the user already
    /// holds the same booking. A different booking in the same slot is
    /// rejected with `SlotTaken`.
    fn save(&self, appointment: &NewAppointment) -> Result<String, MedibookError> {
        let date = appointment.date.format("%Y-%m-%d").to_string();
        let time = appointment.time.format(hhmm::FORMAT).to_string();
        let created_at = Utc::now();

        // Lookup and insert share one transaction so a slot is never
        // claimed twice.
        self.db.with_transaction(|tx| {
            let existing: Option<(String, String, String)> = tx
                .query_row(
                    "SELECT appointment_id, specialty, patient_name FROM appointments
                     WHERE user_id = ?1 AND date = ?2 AND time = ?3",
                    rusqlite::params![appointment.user_id, date, time],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(|e| MedibookError::Storage(e.to_string()))?;
            if let Some((id, specialty, patient_name)) = existing {
                if specialty == appointment.specialty && patient_name == appointment.patient_name {
                    debug!(appointment_id = %id, "Appointment already stored for slot");
                    return Ok(id);
                }
                warn!(
                    user_id = %appointment.user_id,
                    appointment_id = %id,
                    "Slot already held by another booking"
                );
                return Err(MedibookError::SlotTaken(format!("{} {}", date, time)));
            }

            tx.execute(
                "INSERT INTO appointments (user_id, patient_name, specialty, date, time, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    appointment.user_id,
                    appointment.patient_name,
                    appointment.specialty,
                    date,
                    time,
                    appointment.status.to_string(),
                    created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| MedibookError::Storage(format!("Failed to save appointment: {}", e)))?;

            let seq = tx.last_insert_rowid();
            let id = format!("APPT-{}-{:06}", created_at.format("%Y%m%d%H%M%S"), seq);
            tx.execute(
                "UPDATE appointments SET appointment_id = ?1 WHERE seq = ?2",
                rusqlite::params![id, seq],
            )
            .map_err(|e| MedibookError::Storage(format!("Failed to save appointment: {}", e)))?;

            info!(appointment_id = %id, user_id = %appointment.user_id, "Appointment stored");
            Ok(id)
        })
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Appointment>, MedibookError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT appointment_id, user_id, patient_name, specialty, date, time, status, created_at
                     FROM appointments WHERE user_id = ?1
                     ORDER BY seq ASC",
                )
                .map_err(|e| MedibookError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| {
                    Ok(RawAppointment {
                        appointment_id: row.get(0)?,
                        user_id: row.get(1)?,
                        patient_name: row.get(2)?,
                        specialty: row.get(3)?,
                        date: row.get(4)?,
                        time: row.get(5)?,
                        status: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })
                .map_err(|e| MedibookError::Storage(e.to_string()))?;

            let mut appointments = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| MedibookError::Storage(e.to_string()))?;
                appointments.push(raw.into_appointment()?);
            }
            Ok(appointments)
        })
    }
}

struct RawAppointment {
    appointment_id: String,
    user_id: String,
    patient_name: String,
    specialty: String,
    date: String,
    time: String,
    status: String,
    created_at: i64,
}

impl RawAppointment {
    fn into_appointment(self) -> Result<Appointment, MedibookError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| MedibookError::Storage(format!("Invalid stored date: {}", e)))?;
        let time = NaiveTime::parse_from_str(&self.time, hhmm::FORMAT)
            .map_err(|e| MedibookError::Storage(format!("Invalid stored time: {}", e)))?;
        let status = self
            .status
            .parse::<AppointmentStatus>()
            .map_err(MedibookError::Storage)?;
        Ok(Appointment {
            appointment_id: self.appointment_id,
            user_id: self.user_id,
            patient_name: self.patient_name,
            specialty: self.specialty,
            date,
            time,
            status,
            created_at: from_millis(self.created_at),
        })
    }
}

// =============================================================================
// Chat log
// =============================================================================

/// Repository for per-user chat history.
pub struct ChatLogRepository {
    db: Arc<Database>,
}

impl ChatLogRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ChatLog for ChatLogRepository {
    fn append(
        &self,
        user_id: &str,
        role: ChatRole,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), MedibookError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (user_id, role, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    user_id,
                    role.to_string(),
                    content,
                    timestamp.timestamp_millis()
                ],
            )
            .map_err(|e| MedibookError::Storage(format!("Failed to append message: {}", e)))?;
            Ok(())
        })
    }

    fn recent(&self, user_id: &str) -> Result<Vec<ChatMessage>, MedibookError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT role, content, timestamp FROM chat_messages
                     WHERE user_id = ?1 ORDER BY id ASC",
                )
                .map_err(|e| MedibookError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(|e| MedibookError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let (role, content, timestamp) =
                    row.map_err(|e| MedibookError::Storage(e.to_string()))?;
                messages.push(ChatMessage {
                    role: role.parse().map_err(MedibookError::Storage)?,
                    content,
                    timestamp: from_millis(timestamp),
                });
            }
            Ok(messages)
        })
    }

    fn clear(&self, user_id: &str) -> Result<(), MedibookError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM chat_messages WHERE user_id = ?1",
                rusqlite::params![user_id],
            )
            .map_err(|e| MedibookError::Storage(format!("Failed to clear messages: {}", e)))?;
            Ok(())
        })
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
