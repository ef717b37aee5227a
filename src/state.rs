use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ai::LlmProvider;
use crate::services::booking_link::BookingLinkProvider;
use crate::services::messaging::{EmailProvider, MessagingProvider};

/// Shared by every request handler and the reminder dispatcher. External collaborators are
/// optional; an unconfigured one is skipped with a warning wherever it would be used.
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub llm: Option<Box<dyn LlmProvider>>,
    pub messaging: Option<Box<dyn MessagingProvider>>,
    pub email: Option<Box<dyn EmailProvider>>,
    pub booking_links: Option<Box<dyn BookingLinkProvider>>,
}

impl AppState {
    /// State with storage only; every external collaborator is switched off.
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            llm: None,
            messaging: None,
            email: None,
            booking_links: None,
        }
    }

    /// Locks the database. Never hold the guard across an `.await`.
    pub fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }
}
