//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::TokenService;
use crate::config::Settings;
use crate::db::{Database, MemoryDatabase, PropertyRepository, RememberTokenStore, UserRepository};
use crate::security::cors::{CorsPolicy, PatternError};
use crate::security::rate_limit::RateLimiter;
use crate::session::{MemorySessionStore, SessionManager, SessionStore};

/// Everything the pipeline stages and handlers share.
///
/// Built once at startup and cloned into each stage; every field is behind
/// an `Arc`, so tests can build as many isolated instances as they like.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub database: Arc<dyn Database>,
    pub users: Arc<dyn UserRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub remember_tokens: Arc<dyn RememberTokenStore>,
    pub tokens: Arc<TokenService>,
    pub sessions: SessionManager,
    pub rate_limiter: Arc<RateLimiter>,
    pub cors: Arc<CorsPolicy>,
    /// Monotonic start time for the health endpoint.
    pub started_at: Instant,
}

/// Collaborators the state is assembled from.
pub struct Collaborators {
    pub database: Arc<dyn Database>,
    pub users: Arc<dyn UserRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub remember_tokens: Arc<dyn RememberTokenStore>,
    pub session_store: Arc<dyn SessionStore>,
}

impl Collaborators {
    /// Every contract served by one in-memory database.
    pub fn in_memory(db: MemoryDatabase) -> Self {
        let db = Arc::new(db);
        Self {
            database: db.clone(),
            users: db.clone(),
            properties: db.clone(),
            remember_tokens: db,
            session_store: Arc::new(MemorySessionStore::new()),
        }
    }
}

impl AppState {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Result<Self, PatternError> {
        let cors = CorsPolicy::new(&settings.cors_origins, settings.cors_max_age)?;
        let sessions = SessionManager::new(collaborators.session_store, &settings);
        let rate_limiter = RateLimiter::from_settings(&settings);
        let tokens = TokenService::new(&settings.auth);

        Ok(Self {
            settings: Arc::new(settings),
            database: collaborators.database,
            users: collaborators.users,
            properties: collaborators.properties,
            remember_tokens: collaborators.remember_tokens,
            tokens: Arc::new(tokens),
            sessions,
            rate_limiter: Arc::new(rate_limiter),
            cors: Arc::new(cors),
            started_at: Instant::now(),
        })
    }

    /// State over a fresh in-memory database.
    pub fn in_memory(settings: Settings, db: MemoryDatabase) -> Result<Self, PatternError> {
        Self::new(settings, Collaborators::in_memory(db))
    }
}
