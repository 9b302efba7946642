//! Invite routes: creation and management by gallery owners, and public
//! redemption by guests.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use domain::models::invite::{
    CreateInviteRequest, CreateInviteResponse, InviteMeta, InviteStatusResponse, InviteSummary,
    ListInvitesResponse, RedeemInviteRequest, RedeemInviteResponse,
};
use domain::models::derive_capabilities;
use domain::services::CreateInvite;
use shared::validation::normalize_email;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Session;
use crate::services::credentials::guest_payload;

/// Create an invite on a gallery.
///
/// POST /api/v1/galleries/:gallery_id/invites
pub async fn create_invite(
    State(state): State<AppState>,
    session: Session,
    Path(gallery_id): Path<Uuid>,
    Json(request): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreateInviteResponse>), ApiError> {
    request.validate()?;

    let created = state
        .invites
        .create(
            &session.caller(),
            CreateInvite::from_request(gallery_id, request),
            Utc::now(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            id: created.invite.id,
            code: created.invite.code,
            access_url: created.access_url,
            kind: created.invite.kind,
            expires_at: created.invite.expires_at,
            notified: created.notified,
        }),
    ))
}

/// All invites of a gallery with their observed status, newest first.
///
/// GET /api/v1/galleries/:gallery_id/invites
pub async fn list_invites(
    State(state): State<AppState>,
    session: Session,
    Path(gallery_id): Path<Uuid>,
) -> Result<Json<ListInvitesResponse>, ApiError> {
    let now = Utc::now();
    let invites = state
        .invites
        .list_for_gallery(&session.caller(), gallery_id)
        .await?;

    Ok(Json(ListInvitesResponse {
        data: invites
            .into_iter()
            .map(|invite| InviteSummary::observe(invite, now))
            .collect(),
    }))
}

/// GET /api/v1/invites/:invite_id
pub async fn get_invite(
    State(state): State<AppState>,
    session: Session,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<InviteSummary>, ApiError> {
    let invite = state.invites.get(&session.caller(), invite_id).await?;
    Ok(Json(InviteSummary::observe(invite, Utc::now())))
}

/// Redeem an invite by code or by recipient email.
///
/// On success the guest session is attached as a cookie and also returned
/// in the body.
///
/// POST /api/v1/invites/redeem
pub async fn redeem_invite(
    State(state): State<AppState>,
    Json(request): Json<RedeemInviteRequest>,
) -> Result<(HeaderMap, Json<RedeemInviteResponse>), ApiError> {
    let now = Utc::now();
    let (invite, gallery) = state
        .invites
        .validate(request.code.as_deref(), request.email.as_deref(), now)
        .await?;

    // The guest profile is keyed by the best email we know, else by invite.
    let guest_email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(normalize_email)
        .or_else(|| invite.recipient_email.clone());

    // Resolved before consuming capacity so a storage failure here costs no usage.
    let identities = &state.backend.identities;
    let email = guest_email.as_deref();
    let target = &invite;
    let guest = state
        .gateway()
        .run("ensure_guest", move || identities.ensure_guest(email, target))
        .await?;

    let redeemed = state.invites.redeem(&invite, now).await?;
    let capabilities = derive_capabilities(&redeemed);

    let signed = state
        .tokens
        .issue(guest_payload(&guest, capabilities))
        .map_err(|e| ApiError::Internal(format!("failed to issue guest credential: {}", e)))?;

    let mut headers = HeaderMap::new();
    state.cookies.attach(&mut headers, &signed);

    info!(
        invite_id = %redeemed.id,
        gallery_id = %gallery.id,
        guest_id = %guest.id,
        "Guest session started"
    );

    Ok((
        headers,
        Json(RedeemInviteResponse {
            gallery: (&gallery).into(),
            capabilities,
            invite: InviteMeta::from(&redeemed),
            token: signed.token,
            expires_at: signed.expires_at,
        }),
    ))
}

/// POST /api/v1/invites/:invite_id/revoke
pub async fn revoke_invite(
    State(state): State<AppState>,
    session: Session,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<InviteStatusResponse>, ApiError> {
    state.invites.revoke(&session.caller(), invite_id).await?;
    Ok(Json(InviteStatusResponse {
        status: "revoked".to_string(),
    }))
}

/// POST /api/v1/invites/:invite_id/resend
pub async fn resend_invite(
    State(state): State<AppState>,
    session: Session,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<InviteStatusResponse>, ApiError> {
    let sent = state
        .invites
        .resend(&session.caller(), invite_id, Utc::now())
        .await?;

    if !sent {
        warn!(invite_id = %invite_id, "Invite notification could not be re-sent");
    }

    Ok(Json(InviteStatusResponse {
        status: if sent { "sent" } else { "failed" }.to_string(),
    }))
}
