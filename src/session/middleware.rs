//! Session resolution stage.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_cookies::{cookie::time, Cookie, Cookies};

use crate::config::{CookieSecurity, SessionCookiePolicy, Settings};
use crate::http::error::ApiError;
use crate::security::headers::is_https;
use crate::session::handle::{CookieView, Outcome, Session};
use crate::session::signing::{sign, unsign};
use crate::session::store::{SessionRecord, SessionStore};

/// Everything the session stage needs, cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    policy: Arc<SessionCookiePolicy>,
    secret: Arc<[u8]>,
    trust_proxy: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, settings: &Settings) -> Self {
        Self {
            store,
            policy: Arc::new(settings.session_cookie.clone()),
            secret: Arc::from(settings.session_secret.as_slice()),
            trust_proxy: settings.trust_proxy,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn expires_at(&self) -> chrono::DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.policy.ttl).unwrap_or(chrono::Duration::hours(2));
        Utc::now() + ttl
    }

    fn cookie_view(&self, secure: bool) -> CookieView {
        CookieView {
            original_max_age: self.policy.ttl.as_millis() as u64,
            expires: self.expires_at(),
            secure,
            http_only: self.policy.http_only,
            domain: self.policy.domain.clone(),
            path: "/",
            same_site: self.policy.same_site.to_string(),
        }
    }

    fn cookie(&self, id: &str, secure: bool) -> Cookie<'static> {
        Cookie::build((self.policy.name.clone(), sign(id, &self.secret)))
            .path("/")
            .domain(self.policy.domain.clone())
            .http_only(self.policy.http_only)
            .same_site(self.policy.same_site)
            .secure(secure)
            .max_age(ttl_to_cookie(self.policy.ttl))
            .build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.policy.name.clone(), ""))
            .path("/")
            .domain(self.policy.domain.clone())
            .build()
    }
}

fn ttl_to_cookie(ttl: Duration) -> time::Duration {
    time::Duration::seconds(ttl.as_secs() as i64)
}

/// Attach a `Session` to the request and persist it afterwards.
///
/// Existing sessions are saved on every request with a fresh expiry and the
/// cookie is re-issued. New sessions are only saved once written to.
pub async fn resolve_session(
    State(manager): State<SessionManager>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let secure = manager.policy.secure == CookieSecurity::Always
        || is_https(request.headers(), request.uri(), manager.trust_proxy);

    let signed_id = cookies
        .get(&manager.policy.name)
        .and_then(|c| unsign(c.value(), &manager.secret));

    let existing = match signed_id {
        Some(id) => match manager.store.load(&id).await {
            Ok(record) => record.map(|r| (id, r)),
            Err(e) => {
                return ApiError::internal_with("Session store unavailable", e).into_response();
            }
        },
        None => None,
    };

    let view = manager.cookie_view(secure);
    let session = match existing {
        Some((id, record)) => Session::existing(id, record.data, view),
        None => Session::fresh(view),
    };
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    match session.finish() {
        Outcome::Untouched => {}
        Outcome::Save {
            id,
            data,
            previous_id,
        } => {
            if let Some(previous) = previous_id {
                if let Err(e) = manager.store.destroy(&previous).await {
                    tracing::warn!(error = %e, "Failed to drop replaced session");
                }
            }
            let record = SessionRecord {
                data,
                expires_at: manager.expires_at(),
            };
            match manager.store.save(&id, record).await {
                Ok(()) => cookies.add(manager.cookie(&id, secure)),
                Err(e) => tracing::error!(error = %e, "Failed to persist session"),
            }
        }
        Outcome::Destroy { id, persisted } => {
            if persisted {
                if let Err(e) = manager.store.destroy(&id).await {
                    tracing::warn!(error = %e, "Failed to destroy session");
                }
            }
            cookies.remove(manager.removal_cookie());
        }
    }

    response
}
