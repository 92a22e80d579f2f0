//! Multi-turn appointment booking dialogue.
//!
//! `BookingFlowEngine` reads the user's session, computes one transition and
//! writes the result back through the user store. It holds no per-user
//! state of its own.

pub mod catalog;
pub mod keywords;
pub mod parse;
pub mod prompts;
pub mod state_machine;

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use medibook_core::error::MedibookError;
use medibook_core::store::{AppointmentStore, UserStore};
use medibook_core::types::{
    AppointmentStatus, BookingState, NewAppointment, PendingBooking, User,
};

use crate::error::ChatError;
use crate::types::Action;

use prompts::{render, Prompt};
use state_machine::validate_transition;

/// Result of feeding one message to the booking dialogue.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingOutcome {
    pub reply: String,
    /// State of the session after the message.
    pub state: BookingState,
    pub action: Option<Action>,
}

impl BookingOutcome {
    fn new(reply: String, state: BookingState) -> Self {
        Self {
            reply,
            state,
            action: None,
        }
    }
}

/// Finite-state machine over a user's booking session.
pub struct BookingFlowEngine {
    users: Arc<dyn UserStore>,
    appointments: Arc<dyn AppointmentStore>,
    /// Fixed calendar day, used instead of the local clock when set.
    today: Option<NaiveDate>,
}

impl BookingFlowEngine {
    pub fn new(users: Arc<dyn UserStore>, appointments: Arc<dyn AppointmentStore>) -> Self {
        Self {
            users,
            appointments,
            today: None,
        }
    }

    /// Pin "today" to a fixed date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// The idle help reply. Has no side effects.
    pub fn default_reply(&self) -> String {
        render(Prompt::Greeting)
    }

    /// Advance the user's session by one message.
    ///
    /// `user` must be a fresh read taken under the user's lease.
    pub fn handle(&self, user: &User, text: &str) -> Result<BookingOutcome, ChatError> {
        if !user.state.is_idle() && keywords::is_cancel(text) {
            self.transition(user, BookingState::Idle, PendingBooking::default())?;
            info!(user_id = %user.user_id, from = %user.state, "Booking cancelled");
            return Ok(BookingOutcome::new(
                render(Prompt::Cancelled),
                BookingState::Idle,
            ));
        }

        if keywords::is_list_request(text) {
            let appointments = self.appointments.list_by_user(&user.user_id)?;
            return Ok(BookingOutcome::new(
                render(Prompt::Appointments(&appointments)),
                user.state,
            ));
        }

        match user.state {
            BookingState::Idle => self.on_idle(user, text),
            BookingState::AwaitingSpecialty => self.on_specialty(user, text),
            BookingState::AwaitingDate => self.on_date(user, text),
            BookingState::AwaitingTime => self.on_time(user, text),
            BookingState::Confirm => self.on_confirm(user, text),
        }
    }

    fn on_idle(&self, user: &User, text: &str) -> Result<BookingOutcome, ChatError> {
        if !keywords::is_booking_intent(text) {
            return Ok(BookingOutcome::new(self.default_reply(), BookingState::Idle));
        }
        self.advance(
            user,
            BookingState::AwaitingSpecialty,
            PendingBooking::default(),
            render(Prompt::SpecialtyRequest),
        )
    }

    fn on_specialty(&self, user: &User, text: &str) -> Result<BookingOutcome, ChatError> {
        let Some(specialty) = catalog::normalize_specialty(text) else {
            return self.fallback(user);
        };
        let reply = render(Prompt::DateRequest {
            specialty: &specialty,
            today: self.today(),
        });
        let pending = PendingBooking {
            specialty: Some(specialty.clone()),
            ..PendingBooking::default()
        };
        self.advance(user, BookingState::AwaitingDate, pending, reply)
    }

    fn on_date(&self, user: &User, text: &str) -> Result<BookingOutcome, ChatError> {
        if user.pending.specialty.is_none() {
            return self.fallback(user);
        }
        let today = self.today();
        let Some(date) = parse::parse_date(text, today) else {
            return Ok(self.stay(user, Prompt::DateFormatHelp));
        };
        if !parse::is_valid_date(date, today) {
            return Ok(self.stay(user, Prompt::DateInPast));
        }
        let pending = PendingBooking {
            date: Some(date),
            time: None,
            ..user.pending.clone()
        };
        self.advance(
            user,
            BookingState::AwaitingTime,
            pending,
            render(Prompt::TimeRequest { date }),
        )
    }

    fn on_time(&self, user: &User, text: &str) -> Result<BookingOutcome, ChatError> {
        let (Some(specialty), Some(date)) = (&user.pending.specialty, user.pending.date) else {
            return self.fallback(user);
        };
        let Some(time) = parse::parse_time(text) else {
            return Ok(self.stay(user, Prompt::TimeFormatHelp));
        };
        if !catalog::is_slot(time) {
            return Ok(self.stay(user, Prompt::SlotUnavailable));
        }
        let reply = render(Prompt::Summary {
            specialty,
            date,
            time,
            patient: &user.name,
        });
        let pending = PendingBooking {
            time: Some(time),
            ..user.pending.clone()
        };
        self.advance(user, BookingState::Confirm, pending, reply)
    }

    fn on_confirm(&self, user: &User, text: &str) -> Result<BookingOutcome, ChatError> {
        let Some((specialty, date, time)) = user.pending.complete() else {
            return self.fallback(user);
        };

        if keywords::is_affirmative(text) {
            // Saving first keeps a retry safe: the store returns the same id
            // for a booking it already holds.
            let saved = self.appointments.save(&NewAppointment {
                user_id: user.user_id.clone(),
                patient_name: user.name.clone(),
                specialty: specialty.to_string(),
                date,
                time,
                status: AppointmentStatus::Confirmed,
            });
            let appointment_id = match saved {
                Ok(id) => id,
                Err(MedibookError::SlotTaken(_)) => {
                    let pending = PendingBooking {
                        time: None,
                        ..user.pending.clone()
                    };
                    return self.advance(
                        user,
                        BookingState::AwaitingTime,
                        pending,
                        render(Prompt::SlotTaken { date, time }),
                    );
                }
                Err(e) => return Err(e.into()),
            };
            self.transition(user, BookingState::Idle, PendingBooking::default())?;
            info!(user_id = %user.user_id, appointment_id = %appointment_id, "Booking confirmed");

            let reply = render(Prompt::Confirmed {
                appointment_id: &appointment_id,
                specialty,
                date,
                time,
            });
            return Ok(BookingOutcome {
                reply,
                state: BookingState::Idle,
                action: Some(Action::NotifyPatient {
                    appointment_id,
                    date,
                    time,
                }),
            });
        }

        if keywords::is_negative(text) {
            return self.advance(
                user,
                BookingState::AwaitingSpecialty,
                PendingBooking::default(),
                render(Prompt::Restart),
            );
        }

        Ok(self.stay(user, Prompt::ConfirmRetry))
    }

    /// Reset a session whose stored data no longer fits its state.
    fn fallback(&self, user: &User) -> Result<BookingOutcome, ChatError> {
        debug!(user_id = %user.user_id, state = %user.state, "Booking session reset");
        self.advance(
            user,
            BookingState::Idle,
            PendingBooking::default(),
            render(Prompt::NotUnderstood),
        )
    }

    fn stay(&self, user: &User, prompt: Prompt<'_>) -> BookingOutcome {
        BookingOutcome::new(render(prompt), user.state)
    }

    fn advance(
        &self,
        user: &User,
        to: BookingState,
        pending: PendingBooking,
        reply: String,
    ) -> Result<BookingOutcome, ChatError> {
        self.transition(user, to, pending)?;
        Ok(BookingOutcome::new(reply, to))
    }

    fn transition(
        &self,
        user: &User,
        to: BookingState,
        pending: PendingBooking,
    ) -> Result<(), ChatError> {
        validate_transition(user.state, to)?;
        self.users.set_state(&user.user_id, to, &pending)?;
        debug!(user_id = %user.user_id, from = %user.state, to = %to, "Booking transition");
        Ok(())
    }
}
