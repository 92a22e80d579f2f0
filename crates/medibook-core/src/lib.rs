pub mod config;
pub mod error;
pub mod safety;
pub mod store;
pub mod types;

pub use config::MedibookConfig;
pub use error::{MedibookError, Result};
pub use safety::{SafetyFilter, Violation};
pub use store::{AppointmentStore, ChatLog, UserLease, UserLocks, UserStore};
pub use types::*;
