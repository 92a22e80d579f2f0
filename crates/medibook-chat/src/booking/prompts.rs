//! Reply texts for the booking dialogue.
//!
//! Rendering is a pure function of the prompt kind and its parameters; the
//! state machine never depends on the wording.

use chrono::{Days, NaiveDate, NaiveTime};

use medibook_core::types::Appointment;

use super::catalog;

const CANCEL_HINT: &str = "Type 'cancel' to exit.";

/// Every message kind the booking dialogue can send.
#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    Greeting,
    NotUnderstood,
    Cancelled,
    SpecialtyRequest,
    Restart,
    DateRequest {
        specialty: &'a str,
        today: NaiveDate,
    },
    DateFormatHelp,
    DateInPast,
    TimeRequest {
        date: NaiveDate,
    },
    TimeFormatHelp,
    SlotUnavailable,
    /// The user already holds this slot for another booking.
    SlotTaken {
        date: NaiveDate,
        time: NaiveTime,
    },
    Summary {
        specialty: &'a str,
        date: NaiveDate,
        time: NaiveTime,
        patient: &'a str,
    },
    ConfirmRetry,
    Confirmed {
        appointment_id: &'a str,
        specialty: &'a str,
        date: NaiveDate,
        time: NaiveTime,
    },
    Appointments(&'a [Appointment]),
}

pub fn render(prompt: Prompt<'_>) -> String {
    match prompt {
        Prompt::Greeting => format!("I'm your medical booking assistant.\n\n{}", menu()),
        Prompt::NotUnderstood => format!("Sorry, I didn't understand that.\n\n{}", menu()),
        Prompt::Cancelled => "Booking cancelled. Is there anything else I can help with?\n\n\
             Type 'appointment' to start a new booking."
            .to_string(),
        Prompt::SpecialtyRequest => format!(
            "Great, let's book your appointment.\n\nWhich specialty do you need?\n\n{}\n\n\
             Type the specialty name. {}",
            specialty_list(),
            CANCEL_HINT
        ),
        Prompt::Restart => format!(
            "Let's start over.\n\nWhich specialty do you need?\n\n{}\n\n{}",
            specialty_list(),
            CANCEL_HINT
        ),
        Prompt::DateRequest { specialty, today } => {
            let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
            format!(
                "Specialty: {}\n\nWhich date would you prefer?\n\n\
                 - today: {}\n- tomorrow: {}\n- or any date as YYYY-MM-DD or DD/MM/YYYY\n\n{}",
                specialty,
                today.format("%Y-%m-%d"),
                tomorrow.format("%Y-%m-%d"),
                CANCEL_HINT
            )
        }
        Prompt::DateFormatHelp => format!(
            "I couldn't read that date.\n\nPlease use one of these formats:\n\
             - 'today' or 'tomorrow'\n- YYYY-MM-DD (e.g. 2026-01-15)\n\
             - DD/MM/YYYY (e.g. 15/01/2026)\n\n{}",
            CANCEL_HINT
        ),
        Prompt::DateInPast => format!(
            "The date must be today or later.\n\nPlease choose another date.\n\n{}",
            CANCEL_HINT
        ),
        Prompt::TimeRequest { date } => format!(
            "Date: {}\n\nWhat time would you prefer?\n\nAvailable times:\n{}\n\n\
             Type the time (e.g. 09:00, 14:30). {}",
            date.format("%Y-%m-%d"),
            slot_list(),
            CANCEL_HINT
        ),
        Prompt::TimeFormatHelp => format!(
            "I couldn't read that time.\n\nPlease use HH:MM (e.g. 09:00, 14:30).\n\n{}",
            CANCEL_HINT
        ),
        Prompt::SlotUnavailable => format!(
            "That time is not available.\n\nAvailable times:\n{}\n\n{}",
            slot_list(),
            CANCEL_HINT
        ),
        Prompt::SlotTaken { date, time } => format!(
            "You already have an appointment on {} at {}.\n\n\
             Please choose another time:\n{}\n\n{}",
            date.format("%Y-%m-%d"),
            time.format("%H:%M"),
            slot_list(),
            CANCEL_HINT
        ),
        Prompt::Summary {
            specialty,
            date,
            time,
            patient,
        } => format!(
            "Appointment summary:\n\n- Specialty: {}\n- Date: {}\n- Time: {}\n- Patient: {}\n\n\
             Type 'yes' or 'confirm' to book it, 'change' to start over, or 'cancel' to exit.",
            specialty,
            date.format("%Y-%m-%d"),
            time.format("%H:%M"),
            patient
        ),
        Prompt::ConfirmRetry => "I didn't catch that.\n\n- Type 'yes' to confirm the appointment\n\
             - Type 'cancel' to cancel\n- Type 'change' to modify it"
            .to_string(),
        Prompt::Confirmed {
            appointment_id,
            specialty,
            date,
            time,
        } => format!(
            "Your appointment is confirmed!\n\nAppointment ID: {}\n{}\n{} at {}\n\n\
             Please remember to:\n- arrive 15 minutes early\n- bring your ID and insurance card\n\
             - bring previous test results, if you have them\n\nSee you soon!",
            appointment_id,
            specialty,
            date.format("%Y-%m-%d"),
            time.format("%H:%M")
        ),
        Prompt::Appointments([]) => "You have no scheduled appointments.\n\n\
             Would you like to book one? Type 'I want an appointment'."
            .to_string(),
        Prompt::Appointments(appointments) => {
            let mut reply = String::from("Your appointments:\n");
            for (i, appt) in appointments.iter().enumerate() {
                reply.push_str(&format!(
                    "\n{}. {}\n   {} at {}\n   Status: {}\n",
                    i + 1,
                    appt.specialty,
                    appt.date.format("%Y-%m-%d"),
                    appt.time.format("%H:%M"),
                    appt.status
                ));
            }
            reply
        }
    }
}

fn menu() -> &'static str {
    "I can help you:\n- book an appointment: type 'I want an appointment'\n\
     - see your appointments: type 'my appointments'\n\
     - answer questions about hours, prices and specialties\n\nWhat would you like to do?"
}

fn specialty_list() -> String {
    catalog::specialties()
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn slot_list() -> String {
    let join = |times: Vec<NaiveTime>| {
        times
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let (morning, afternoon) = catalog::slots_by_period();
    format!("Morning: {}\nAfternoon: {}", join(morning), join(afternoon))
}
