//! Persistence collaborators.
//!
//! # Data Flow
//! ```text
//! pipeline stages / route handlers
//!     → repository traits (this module)
//!     → MemoryDatabase (memory.rs), or any other backend
//! ```
//!
//! The pipeline only depends on the traits below. The bundled
//! `MemoryDatabase` keeps everything in process memory and loses it on
//! restart.

pub mod memory;
pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryDatabase;
pub use models::{NewProperty, NewUser, Property, PropertyQuery, Role, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection is closed")]
    Closed,

    #[error("{entity} already exists")]
    Conflict { entity: &'static str },

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Connection-level operations.
#[async_trait]
pub trait Database: Send + Sync {
    /// Round-trip check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Close the connection. Further calls fail with `StoreError::Closed`.
    async fn close(&self);
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// One page of users ordered by creation time, plus the total count.
    async fn list(&self, offset: usize, limit: usize) -> Result<(Vec<User>, usize), StoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}

#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Property>, StoreError>;

    /// Filtered page plus the total number of matches.
    async fn search(
        &self,
        query: &PropertyQuery,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Property>, usize), StoreError>;

    async fn insert(&self, owner_id: Uuid, property: NewProperty) -> Result<Property, StoreError>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Long-lived remember-me credentials.
#[async_trait]
pub trait RememberTokenStore: Send + Sync {
    /// Create a new opaque token for the user.
    async fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String, StoreError>;

    /// Resolve a token to its user, or `None` if unknown or expired.
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, StoreError>;

    async fn revoke(&self, token: &str) -> Result<(), StoreError>;
}
