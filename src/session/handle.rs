//! Per-request session handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::http::error::ApiError;

/// Cookie attributes echoed back by diagnostic endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieView {
    pub original_max_age: u64,
    pub expires: DateTime<Utc>,
    pub secure: bool,
    pub http_only: bool,
    pub domain: String,
    pub path: &'static str,
    pub same_site: String,
}

#[derive(Debug)]
struct Inner {
    id: String,
    data: Map<String, Value>,
    is_new: bool,
    modified: bool,
    destroyed: bool,
    previous_id: Option<String>,
    cookie: CookieView,
}

/// What the session stage must do once the response is ready.
#[derive(Debug, PartialEq)]
pub(crate) enum Outcome {
    /// New session that was never written to.
    Untouched,
    Save {
        id: String,
        data: Map<String, Value>,
        previous_id: Option<String>,
    },
    Destroy {
        id: String,
        persisted: bool,
    },
}

/// Shared handle to the session of the current request.
///
/// Cloning is cheap; all clones see the same state.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    pub(crate) fn fresh(cookie: CookieView) -> Self {
        Self::build(new_id(), Map::new(), true, cookie)
    }

    pub(crate) fn existing(id: String, data: Map<String, Value>, cookie: CookieView) -> Self {
        Self::build(id, data, false, cookie)
    }

    fn build(id: String, data: Map<String, Value>, is_new: bool, cookie: CookieView) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id,
                data,
                is_new,
                modified: false,
                destroyed: false,
                previous_id: None,
                cookie,
            })),
        }
    }

    // A panicking handler leaves the data intact; keep serving it.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.lock();
        inner
            .data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.lock();
        inner.data.insert(key.to_string(), value);
        inner.modified = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    /// Replace the session id, keeping the data. Used on login.
    pub fn cycle_id(&self) {
        let mut inner = self.lock();
        let old = std::mem::replace(&mut inner.id, new_id());
        if !inner.is_new && inner.previous_id.is_none() {
            inner.previous_id = Some(old);
        }
        inner.modified = true;
    }

    /// Drop the session from the store and clear the cookie.
    pub fn destroy(&self) {
        self.lock().destroyed = true;
    }

    /// Data plus cookie attributes, shaped for JSON output.
    pub fn to_json(&self) -> Value {
        let inner = self.lock();
        let mut object = inner.data.clone();
        object.insert("cookie".to_string(), json!(inner.cookie));
        Value::Object(object)
    }

    pub(crate) fn finish(&self) -> Outcome {
        let inner = self.lock();
        if inner.destroyed {
            return Outcome::Destroy {
                id: inner.id.clone(),
                persisted: !inner.is_new,
            };
        }
        if inner.is_new && !inner.modified {
            return Outcome::Untouched;
        }
        Outcome::Save {
            id: inner.id.clone(),
            data: inner.data.clone(),
            previous_id: inner.previous_id.clone(),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::internal("session stage is not installed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> CookieView {
        CookieView {
            original_max_age: 7_200_000,
            expires: Utc::now(),
            secure: false,
            http_only: true,
            domain: "localhost".into(),
            path: "/",
            same_site: "Lax".into(),
        }
    }

    #[test]
    fn test_untouched_new_session_is_not_saved() {
        let session = Session::fresh(view());
        assert_eq!(session.finish(), Outcome::Untouched);
    }

    #[test]
    fn test_existing_session_always_saved() {
        let session = Session::existing("abc".into(), Map::new(), view());
        assert!(matches!(session.finish(), Outcome::Save { id, .. } if id == "abc"));
    }

    #[test]
    fn test_insert_and_get() {
        let session = Session::fresh(view());
        session.insert("views", 3u64).unwrap();
        assert_eq!(session.get::<u64>("views"), Some(3));
        assert_eq!(session.get::<String>("views"), None);

        let json = session.to_json();
        assert_eq!(json["views"], 3);
        assert_eq!(json["cookie"]["httpOnly"], true);
    }

    #[test]
    fn test_usable_after_panic_while_locked() {
        let session = Session::fresh(view());
        session.insert("views", 1u64).unwrap();

        let held = session.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = held.lock();
            panic!("handler failed mid-request");
        })
        .join();
        assert!(crashed.is_err());

        session.insert("views", 2u64).unwrap();
        assert_eq!(session.get::<u64>("views"), Some(2));
    }

    #[test]
    fn test_cycle_id_remembers_persisted_id() {
        let session = Session::existing("old".into(), Map::new(), view());
        session.cycle_id();
        match session.finish() {
            Outcome::Save { id, previous_id, .. } => {
                assert_ne!(id, "old");
                assert_eq!(previous_id.as_deref(), Some("old"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_destroy() {
        let fresh = Session::fresh(view());
        fresh.destroy();
        assert!(matches!(fresh.finish(), Outcome::Destroy { persisted: false, .. }));

        let stored = Session::existing("abc".into(), Map::new(), view());
        stored.destroy();
        assert!(matches!(stored.finish(), Outcome::Destroy { persisted: true, .. }));
    }
}
