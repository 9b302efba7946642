//! Session routes: password sign-in for owners and administrators, sign-out,
//! and the current-identity probe.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use domain::models::identity::{CurrentIdentityResponse, LoginRequest, LoginResponse};
use domain::models::IdentityView;
use shared::password::verify_password_or_dummy;
use shared::validation::normalize_email;
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::OptionalSession;
use crate::services::credentials::management_payload;

const INVALID_LOGIN: &str = "Invalid email or password";

/// Sign in with email and password.
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), ApiError> {
    request.validate()?;

    let email = normalize_email(&request.email);
    let lookup = email.as_str();
    let identities = &state.backend.identities;
    let identity = state
        .gateway()
        .run("find_identity_by_email", move || {
            identities.find_identity_by_email(lookup)
        })
        .await?;

    // Guests have no password; treat them like unknown accounts.
    let identity = identity.filter(|i| i.role.can_use_password());
    let hash = identity.as_ref().and_then(|i| i.password_hash.clone());
    let password = request.password;
    let verified = tokio::task::spawn_blocking(move || {
        verify_password_or_dummy(&password, hash.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("password verification task failed: {}", e)))?;

    let identity = match identity {
        Some(identity) if verified => identity,
        _ => {
            warn!("Failed sign-in attempt");
            return Err(ApiError::Unauthenticated(INVALID_LOGIN.to_string()));
        }
    };

    let signed = state
        .tokens
        .issue(management_payload(&identity))
        .map_err(|e| ApiError::Internal(format!("failed to issue credential: {}", e)))?;

    let mut headers = HeaderMap::new();
    state.cookies.attach(&mut headers, &signed);

    info!(identity_id = %identity.id, role = %identity.role, "Signed in");

    Ok((
        headers,
        Json(LoginResponse {
            identity: IdentityView {
                id: identity.id,
                email: identity.email.clone(),
                role: identity.role,
                display_name: Some(identity.display_name.clone()),
            },
            capabilities: shared::capability::CapabilityBundle::all(),
            token: signed.token,
            expires_in: state.tokens.ttl_secs,
        }),
    ))
}

/// Clear the session cookie.
///
/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>) -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    state.cookies.clear(&mut headers);
    (StatusCode::NO_CONTENT, headers)
}

/// Identity and capabilities of the attached credential, or `null`.
///
/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    credential: OptionalSession,
) -> (HeaderMap, Json<Option<CurrentIdentityResponse>>) {
    let mut headers = HeaderMap::new();
    if credential.stale_cookie {
        state.cookies.clear(&mut headers);
    }

    let body = credential.session.map(|session| CurrentIdentityResponse {
        identity: IdentityView {
            id: session.subject_id(),
            email: session.claims.email.clone(),
            role: session.role(),
            display_name: None,
        },
        capabilities: session.capabilities(),
    });

    (headers, Json(body))
}
