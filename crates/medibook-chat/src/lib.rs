//! Conversational core of the booking assistant.
//!
//! Routes free-text messages to the booking dialogue, the FAQ matcher or an
//! optional generative backend, and keeps a per-user conversation memory.

pub mod actions;
pub mod booking;
pub mod error;
pub mod faq;
pub mod generative;
pub mod memory;
pub mod router;
pub mod types;

pub use actions::execute_action;
pub use booking::{BookingFlowEngine, BookingOutcome};
pub use error::{ChatError, GenerativeError};
pub use faq::{FaqEntry, FaqMatch, FaqMatcher};
pub use generative::{GenerationRequest, GenerativeBackend, HttpGenerativeBackend, TextStream};
pub use memory::ConversationMemory;
pub use router::{IntentRouter, ReplyStream};
pub use types::{Action, ActionOutcome, Reasoning, RouterReply, StreamEvent};
