//! Shared application state.

use std::sync::Arc;

use shopdesk_db::Database;

use crate::auth::JwtManager;

/// Handed to every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, jwt: JwtManager) -> Self {
        AppState {
            db,
            jwt: Arc::new(jwt),
        }
    }
}
