//! SQLite persistence for users, appointments and chat history.
//!
//! Provides a WAL-mode SQLite database with migrations and repository
//! implementations of the collaborator traits defined in `medibook-core`.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{AppointmentRepository, ChatLogRepository, UserRepository};
