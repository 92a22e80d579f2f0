//! Router output types.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};

use medibook_core::types::{hhmm, BookingState};

/// Machine-readable tag naming the routing branch that produced a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reasoning {
    /// Blocked by the denylist; carries the matched term.
    Safety { term: String },
    /// Idle user started the booking dialogue.
    BookingIntent,
    /// Idle user asked for their appointment list.
    AppointmentList,
    /// Continuation of an open booking session in the given state.
    Booking(BookingState),
    Faq { similarity: f32 },
    Generative,
    /// Nothing else applied; the idle help prompt was returned.
    BookingDefault,
}

impl fmt::Display for Reasoning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reasoning::Safety { term } => write!(f, "safety:{}", term),
            Reasoning::BookingIntent => write!(f, "booking:intent"),
            Reasoning::AppointmentList => write!(f, "booking:list"),
            Reasoning::Booking(state) => write!(f, "booking:{}", state),
            Reasoning::Faq { similarity } => write!(f, "faq:{:.2}", similarity),
            Reasoning::Generative => write!(f, "generative"),
            Reasoning::BookingDefault => write!(f, "booking:default"),
        }
    }
}

impl Serialize for Reasoning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Side effect requested by a reply, executed by the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", content = "data", rename_all = "snake_case")]
pub enum Action {
    #[serde(rename = "notify")]
    NotifyPatient {
        appointment_id: String,
        date: NaiveDate,
        #[serde(with = "hhmm")]
        time: NaiveTime,
    },
}

/// Result of executing an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

/// The reply to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterReply {
    pub to_user: String,
    pub reasoning: Reasoning,
    pub is_faq_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faq_similarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl RouterReply {
    pub fn new(to_user: impl Into<String>, reasoning: Reasoning) -> Self {
        Self {
            to_user: to_user.into(),
            reasoning,
            is_faq_response: false,
            faq_similarity: None,
            action: None,
        }
    }

    pub fn faq(answer: impl Into<String>, similarity: f32) -> Self {
        Self {
            to_user: answer.into(),
            reasoning: Reasoning::Faq { similarity },
            is_faq_response: true,
            faq_similarity: Some(similarity),
            action: None,
        }
    }

    pub fn with_action(mut self, action: Option<Action>) -> Self {
        self.action = action;
        self
    }
}

/// One item of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A piece of reply text.
    Fragment(String),
    /// Terminal marker. `to_user` is the concatenation of every fragment.
    Done(RouterReply),
    /// The request failed after streaming began.
    Error(String),
}
