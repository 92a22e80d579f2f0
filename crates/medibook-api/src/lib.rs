//! HTTP boundary for the booking assistant: axum routes, handlers and SSE
//! streaming of chat replies.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
