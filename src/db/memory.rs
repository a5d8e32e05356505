//! In-process database used by default and in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::db::models::{NewProperty, NewUser, Property, PropertyQuery, Role, User};
use crate::db::{Database, PropertyRepository, RememberTokenStore, StoreError, UserRepository};

/// Credentials of the seeded demo account.
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "password123";

#[derive(Debug, Clone)]
struct RememberEntry {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// Concurrent maps standing in for a real database.
#[derive(Debug)]
pub struct MemoryDatabase {
    connected: AtomicBool,
    users: DashMap<Uuid, User>,
    properties: DashMap<Uuid, Property>,
    /// Keyed by SHA-256 of the token so raw tokens are never stored.
    remember_tokens: DashMap<String, RememberEntry>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            users: DashMap::new(),
            properties: DashMap::new(),
            remember_tokens: DashMap::new(),
        }
    }

    /// A database holding the demo account and a handful of listings.
    pub fn with_demo_data() -> Self {
        let db = Self::new();
        let owner = User {
            id: Uuid::new_v4(),
            email: DEMO_EMAIL.to_string(),
            name: "Demo Agent".to_string(),
            role: Role::Agent,
            password_hash: hash_password(DEMO_PASSWORD),
            created_at: Utc::now(),
        };

        let listings = [
            ("Sunny two-bed flat", "Lisbon", "Rua Augusta 12", 320_000, 2, 1),
            ("Riverside loft", "Porto", "Cais da Ribeira 4", 275_000, 1, 1),
            ("Family house with garden", "Lisbon", "Avenida da Liberdade 200", 640_000, 4, 3),
            ("Beach studio", "Faro", "Praia de Faro 7", 150_000, 1, 1),
        ];
        for (title, city, address, price, bedrooms, bathrooms) in listings {
            let property = Property {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: format!("{} in {}", title, city),
                city: city.to_string(),
                address: address.to_string(),
                price,
                bedrooms,
                bathrooms,
                owner_id: owner.id,
                created_at: Utc::now(),
            };
            db.properties.insert(property.id, property);
        }
        db.users.insert(owner.id, owner);

        tracing::info!(
            users = db.users.len(),
            properties = db.properties.len(),
            "Seeded in-memory database"
        );
        db
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn page<T: Clone>(items: &[T], offset: usize, limit: usize) -> Vec<T> {
    items.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!("Database connection closed");
        }
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.ensure_open()?;
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .users
            .iter()
            .find(|r| r.value().email.eq_ignore_ascii_case(email))
            .map(|r| r.value().clone()))
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<(Vec<User>, usize), StoreError> {
        self.ensure_open()?;
        let mut all: Vec<User> = self.users.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|u| u.created_at);
        Ok((page(&all, offset, limit), all.len()))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.ensure_open()?;
        if UserRepository::find_by_email(self, &user.email).await?.is_some() {
            return Err(StoreError::Conflict { entity: "user" });
        }
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        self.users.insert(record.id, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl PropertyRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        self.ensure_open()?;
        Ok(self.properties.get(&id).map(|r| r.value().clone()))
    }

    async fn search(
        &self,
        query: &PropertyQuery,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Property>, usize), StoreError> {
        self.ensure_open()?;
        let mut hits: Vec<Property> = self
            .properties
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.title.cmp(&b.title)));
        Ok((page(&hits, offset, limit), hits.len()))
    }

    async fn insert(&self, owner_id: Uuid, property: NewProperty) -> Result<Property, StoreError> {
        self.ensure_open()?;
        let record = Property {
            id: Uuid::new_v4(),
            title: property.title,
            description: property.description,
            city: property.city,
            address: property.address,
            price: property.price,
            bedrooms: property.bedrooms,
            bathrooms: property.bathrooms,
            owner_id,
            created_at: Utc::now(),
        };
        self.properties.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.properties.remove(&id).is_some())
    }
}

#[async_trait]
impl RememberTokenStore for MemoryDatabase {
    async fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String, StoreError> {
        self.ensure_open()?;
        let token = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.remember_tokens.insert(
            token_digest(&token),
            RememberEntry {
                user_id,
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(token)
    }

    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        self.ensure_open()?;
        let key = token_digest(token);
        let entry = self.remember_tokens.get(&key).map(|r| r.value().clone());
        match entry {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.user_id)),
            Some(_) => {
                self.remember_tokens.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.remember_tokens.remove(&token_digest(token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_fails_further_calls() {
        let db = MemoryDatabase::new();
        assert!(db.ping().await.is_ok());

        db.close().await;
        assert!(!db.is_connected());
        assert!(matches!(db.ping().await, Err(StoreError::Closed)));
        assert!(matches!(
            UserRepository::find_by_id(&db, Uuid::nil()).await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_remember_token_lifecycle() {
        let db = MemoryDatabase::new();
        let user_id = Uuid::new_v4();

        let token = db.issue(user_id, Duration::from_secs(60)).await.unwrap();
        assert_eq!(db.resolve(&token).await.unwrap(), Some(user_id));
        assert_eq!(db.resolve("forged").await.unwrap(), None);

        db.revoke(&token).await.unwrap();
        assert_eq!(db.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_remember_token() {
        let db = MemoryDatabase::new();
        let token = db.issue(Uuid::new_v4(), Duration::ZERO).await.unwrap();
        assert_eq!(db.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let db = MemoryDatabase::new();
        let new_user = || NewUser {
            email: "a@b.test".into(),
            name: "A".into(),
            role: Role::User,
            password_hash: "x".into(),
        };
        UserRepository::insert(&db, new_user()).await.unwrap();
        assert!(matches!(
            UserRepository::insert(&db, new_user()).await,
            Err(StoreError::Conflict { entity: "user" })
        ));
    }

    #[tokio::test]
    async fn test_search_pages() {
        let db = MemoryDatabase::with_demo_data();
        let query = PropertyQuery {
            city: Some("Lisbon".into()),
            ..Default::default()
        };
        let (first, total) = db.search(&query, 0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(first.len(), 1);
        let (rest, _) = db.search(&query, 1, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_ne!(first[0].id, rest[0].id);
    }
}
