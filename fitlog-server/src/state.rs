use std::sync::Arc;

use anyhow::Result;

use crate::config::Settings;
use crate::db::Database;
use crate::session::SessionManager;
use crate::storage::{self, MediaStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub session_manager: SessionManager,
    pub media: Arc<dyn MediaStore>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build state with the media backend named in the settings
    pub fn new(db: Database, settings: Settings) -> Result<Self> {
        let media = storage::from_settings(&settings, db.pool.clone())?;
        Ok(Self::with_media(db, settings, media))
    }

    pub fn with_media(db: Database, settings: Settings, media: Arc<dyn MediaStore>) -> Self {
        let session_manager = SessionManager::new(db.clone(), settings.sessions.ttl_days);
        Self {
            db,
            session_manager,
            media,
            settings: Arc::new(settings),
        }
    }

    /// Get authenticated user ID from session token
    pub fn get_authenticated_user_id_from_token(&self, token: &str) -> Option<uuid::Uuid> {
        match self.session_manager.validate_session(token) {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::error!("Session lookup failed: {:#}", e);
                None
            }
        }
    }
}
