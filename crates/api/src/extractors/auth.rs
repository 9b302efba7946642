//! Credential extractors.
//!
//! A credential is read from `Authorization: Bearer <token>` first and from
//! the session cookie second. Expired, malformed and forged tokens are all
//! treated as unauthenticated; the distinct kind only reaches the logs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::services::Caller;
use shared::capability::{CapabilityBundle, Role};
use shared::jwt::Claims;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Bearer,
    Cookie,
}

/// A verified credential.
#[derive(Debug, Clone)]
pub struct Session {
    pub claims: Claims,
    pub source: CredentialSource,
}

impl Session {
    pub fn subject_id(&self) -> Uuid {
        self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn capabilities(&self) -> CapabilityBundle {
        self.claims.permissions
    }

    /// The actor for invite management calls.
    pub fn caller(&self) -> Caller {
        Caller {
            subject_id: self.claims.sub,
            role: self.claims.role,
            email: self.claims.email.clone(),
        }
    }
}

/// Outcome of looking for a credential on a request.
enum Lookup {
    Missing,
    Rejected(CredentialSource),
    Verified(Session),
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn lookup(parts: &Parts, state: &AppState) -> Lookup {
    let (token, source) = match bearer_token(parts) {
        Some(token) => (token, CredentialSource::Bearer),
        None => match state.cookies.extract(&parts.headers) {
            Some(token) => (token, CredentialSource::Cookie),
            None => return Lookup::Missing,
        },
    };

    match state.tokens.verify(token) {
        Ok(claims) => Lookup::Verified(Session { claims, source }),
        Err(e) => {
            tracing::debug!(kind = e.kind(), source = ?source, "Credential rejected");
            metrics::counter!("credential_rejections_total", "kind" => e.kind()).increment(1);
            Lookup::Rejected(source)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        match lookup(parts, state) {
            Lookup::Verified(session) => {
                parts.extensions.insert(session.clone());
                Ok(session)
            }
            Lookup::Missing => Err(ApiError::Unauthenticated(
                "Authentication required".to_string(),
            )),
            Lookup::Rejected(_) => Err(ApiError::Unauthenticated(
                "Invalid or expired credential".to_string(),
            )),
        }
    }
}

/// Optional credential. Never rejects the request.
#[derive(Debug, Clone)]
pub struct OptionalSession {
    pub session: Option<Session>,
    /// A session cookie was sent but failed verification.
    pub stale_cookie: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (session, stale_cookie) = match lookup(parts, state) {
            Lookup::Verified(session) => (Some(session), false),
            Lookup::Missing => (None, false),
            Lookup::Rejected(source) => (None, source == CredentialSource::Cookie),
        };
        Ok(OptionalSession {
            session,
            stale_cookie,
        })
    }
}
