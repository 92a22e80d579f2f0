//! Application state shared across all route handlers.
//!
//! AppState wires the SQLite repositories into the message router and is
//! passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use medibook_chat::{HttpGenerativeBackend, IntentRouter};
use medibook_core::config::MedibookConfig;
use medibook_core::store::{AppointmentStore, ChatLog, UserStore};
use medibook_storage::{AppointmentRepository, ChatLogRepository, Database, UserRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<MedibookConfig>,
    /// Message router (safety, booking, FAQ, generative).
    pub router: Arc<IntentRouter>,
    pub users: Arc<dyn UserStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Build the state on top of an opened database.
    ///
    /// The generative backend is attached only when enabled in config and
    /// its HTTP client can be built.
    pub fn new(config: MedibookConfig, database: Database) -> Self {
        let db = Arc::new(database);
        let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(Arc::clone(&db)));
        let appointments: Arc<dyn AppointmentStore> =
            Arc::new(AppointmentRepository::new(Arc::clone(&db)));
        let log: Arc<dyn ChatLog> = Arc::new(ChatLogRepository::new(db));

        let mut router = IntentRouter::new(
            &config,
            Arc::clone(&users),
            Arc::clone(&appointments),
            log,
        );
        if config.generative.enabled {
            match HttpGenerativeBackend::new(&config.generative) {
                Ok(backend) => {
                    info!(base_url = %config.generative.base_url, "Generative backend enabled");
                    router = router.with_generative(Arc::new(backend));
                }
                Err(e) => warn!(error = %e, "Generative backend unavailable, continuing without it"),
            }
        }

        Self::with_router(config, router, users, appointments)
    }

    /// Assemble the state from an already-built router.
    pub fn with_router(
        config: MedibookConfig,
        router: IntentRouter,
        users: Arc<dyn UserStore>,
        appointments: Arc<dyn AppointmentStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            router: Arc::new(router),
            users,
            appointments,
            start_time: Instant::now(),
        }
    }
}
