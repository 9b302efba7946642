//! Invite domain models: capability-scoped, revocable access grants to a gallery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::capability::CapabilityBundle;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::gallery::GallerySummary;
use crate::errors::InviteError;

/// Redemption cardinality of an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteKind {
    SingleUse,
    MultiUse,
}

impl InviteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteKind::SingleUse => "single_use",
            InviteKind::MultiUse => "multi_use",
        }
    }
}

impl FromStr for InviteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_use" => Ok(InviteKind::SingleUse),
            "multi_use" => Ok(InviteKind::MultiUse),
            _ => Err(format!("Invalid invite kind: {}", s)),
        }
    }
}

impl fmt::Display for InviteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted status of an invite.
///
/// Expiry is never stored; it is derived from `expires_at` at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Active,
    Revoked,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Active => "active",
            InviteStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an invite as observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedStatus {
    Pending,
    Active,
    /// Every unit of capacity has been redeemed.
    Used,
    Expired,
    Revoked,
}

/// A single access grant to one gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: Uuid,
    /// Lowercase, unique code.
    pub code: String,
    pub gallery_id: Uuid,
    pub recipient_email: Option<String>,
    pub kind: InviteKind,
    pub status: InviteStatus,
    pub capabilities: CapabilityBundle,
    pub usage_count: i32,
    /// `None` means unlimited.
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_usage.is_some_and(|max| self.usage_count >= max)
    }

    pub fn observed_status(&self, now: DateTime<Utc>) -> ObservedStatus {
        match self.status {
            InviteStatus::Revoked => ObservedStatus::Revoked,
            InviteStatus::Pending => ObservedStatus::Pending,
            InviteStatus::Active if self.is_expired_at(now) => ObservedStatus::Expired,
            InviteStatus::Active if self.is_exhausted() => ObservedStatus::Used,
            InviteStatus::Active => ObservedStatus::Active,
        }
    }

    /// Runs the ordered redeemability checks, stopping at the first failure.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), InviteError> {
        if self.status != InviteStatus::Active {
            return Err(InviteError::NotActive);
        }
        if self.is_expired_at(now) {
            return Err(InviteError::Expired);
        }
        if self.is_exhausted() {
            return Err(InviteError::UsageExceeded);
        }
        Ok(())
    }
}

/// Runtime permissions granted by an invite: a direct copy of its stored bundle.
pub fn derive_capabilities(invite: &Invite) -> CapabilityBundle {
    invite.capabilities
}

/// True iff the invite is active, unexpired and has capacity left at `now`.
pub fn is_effectively_accessible(invite: &Invite, now: DateTime<Utc>) -> bool {
    invite.check_redeemable(now).is_ok()
}

/// Fields of an invite about to be persisted.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub code: String,
    pub gallery_id: Uuid,
    pub recipient_email: Option<String>,
    pub kind: InviteKind,
    pub capabilities: CapabilityBundle,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

/// Request to create a new invite.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub recipient_email: Option<String>,

    /// Defaults to `CapabilityBundle::default_invite()`: view and favorite.
    pub capabilities: Option<CapabilityBundle>,

    /// Defaults to single use.
    pub kind: Option<InviteKind>,

    #[validate(range(min = 1, max = 10000, message = "maxUsage must be between 1 and 10000"))]
    pub max_usage: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Response after creating an invite.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteResponse {
    pub id: Uuid,
    pub code: String,
    pub access_url: String,
    pub kind: InviteKind,
    pub expires_at: Option<DateTime<Utc>>,
    pub notified: bool,
}

/// Request to redeem an invite, by code or by recipient email.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemInviteRequest {
    pub code: Option<String>,
    pub email: Option<String>,
}

/// Invite metadata returned to a guest after redemption.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMeta {
    pub id: Uuid,
    pub kind: InviteKind,
    pub usage_count: i32,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Invite> for InviteMeta {
    fn from(invite: &Invite) -> Self {
        Self {
            id: invite.id,
            kind: invite.kind,
            usage_count: invite.usage_count,
            max_usage: invite.max_usage,
            expires_at: invite.expires_at,
        }
    }
}

/// Response after redeeming an invite.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemInviteResponse {
    pub gallery: GallerySummary,
    pub capabilities: CapabilityBundle,
    pub invite: InviteMeta,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Invite as listed to its gallery owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    pub id: Uuid,
    pub code: String,
    pub recipient_email: Option<String>,
    pub kind: InviteKind,
    pub status: ObservedStatus,
    pub capabilities: CapabilityBundle,
    pub usage_count: i32,
    pub max_usage: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl InviteSummary {
    pub fn observe(invite: Invite, now: DateTime<Utc>) -> Self {
        let status = invite.observed_status(now);
        Self {
            id: invite.id,
            code: invite.code,
            recipient_email: invite.recipient_email,
            kind: invite.kind,
            status,
            capabilities: invite.capabilities,
            usage_count: invite.usage_count,
            max_usage: invite.max_usage,
            expires_at: invite.expires_at,
            created_at: invite.created_at,
            used_at: invite.used_at,
        }
    }
}

/// Response for listing a gallery's invites.
#[derive(Debug, Clone, Serialize)]
pub struct ListInvitesResponse {
    pub data: Vec<InviteSummary>,
}

/// Outcome of a revoke or resend request.
#[derive(Debug, Clone, Serialize)]
pub struct InviteStatusResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(
        status: InviteStatus,
        expires_at: Option<DateTime<Utc>>,
        usage_count: i32,
        max_usage: Option<i32>,
    ) -> Invite {
        Invite {
            id: Uuid::new_v4(),
            code: "abcdefghjkmn".into(),
            gallery_id: Uuid::new_v4(),
            recipient_email: None,
            kind: InviteKind::MultiUse,
            status,
            capabilities: CapabilityBundle::default_invite(),
            usage_count,
            max_usage,
            expires_at,
            created_by: Uuid::new_v4(),
            created_at: Utc::now() - Duration::days(1),
            used_at: None,
        }
    }

    /// Every combination of status x expiry x usage.
    #[test]
    fn test_is_effectively_accessible_table() {
        let now = Utc::now();
        let statuses = [
            (InviteStatus::Pending, false),
            (InviteStatus::Active, true),
            (InviteStatus::Revoked, false),
        ];
        let expiries = [
            (None, true),
            (Some(now + Duration::hours(1)), true),
            (Some(now), false),
            (Some(now - Duration::seconds(1)), false),
        ];
        let usages = [
            (0, None, true),
            (500, None, true),
            (0, Some(1), true),
            (1, Some(1), false),
            (2, Some(3), true),
            (3, Some(3), false),
        ];

        for (status, status_ok) in statuses {
            for (expires_at, expiry_ok) in expiries {
                for (count, max, usage_ok) in usages {
                    let inv = invite(status, expires_at, count, max);
                    let expected = status_ok && expiry_ok && usage_ok;
                    assert_eq!(
                        is_effectively_accessible(&inv, now),
                        expected,
                        "status={:?} expires_at={:?} usage={}/{:?}",
                        status,
                        expires_at,
                        count,
                        max
                    );
                }
            }
        }
    }

    #[test]
    fn test_check_order_short_circuits() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));

        // Revoked, expired and exhausted at once: only NotActive is reported.
        let inv = invite(InviteStatus::Revoked, past, 1, Some(1));
        assert_eq!(inv.check_redeemable(now), Err(InviteError::NotActive));

        let inv = invite(InviteStatus::Active, past, 1, Some(1));
        assert_eq!(inv.check_redeemable(now), Err(InviteError::Expired));

        let inv = invite(InviteStatus::Active, None, 1, Some(1));
        assert_eq!(inv.check_redeemable(now), Err(InviteError::UsageExceeded));
    }

    #[test]
    fn test_observed_status() {
        let now = Utc::now();
        let past = Some(now - Duration::minutes(5));
        assert_eq!(
            invite(InviteStatus::Active, past, 0, None).observed_status(now),
            ObservedStatus::Expired
        );
        assert_eq!(
            invite(InviteStatus::Active, None, 3, Some(3)).observed_status(now),
            ObservedStatus::Used
        );
        assert_eq!(
            invite(InviteStatus::Revoked, past, 3, Some(3)).observed_status(now),
            ObservedStatus::Revoked
        );
        assert_eq!(
            invite(InviteStatus::Active, None, 0, None).observed_status(now),
            ObservedStatus::Active
        );
    }

    #[test]
    fn test_derive_capabilities_copies_bundle() {
        let mut inv = invite(InviteStatus::Active, None, 0, None);
        inv.capabilities = CapabilityBundle {
            can_download: true,
            ..CapabilityBundle::none()
        };
        assert_eq!(derive_capabilities(&inv), inv.capabilities);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [InviteKind::SingleUse, InviteKind::MultiUse] {
            assert_eq!(InviteKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(InviteKind::from_str("forever").is_err());
    }

    #[test]
    fn test_create_invite_request_validation() {
        let valid = CreateInviteRequest {
            recipient_email: Some("guest@example.com".into()),
            capabilities: None,
            kind: Some(InviteKind::MultiUse),
            max_usage: Some(5),
            expires_at: None,
        };
        assert!(valid.validate().is_ok());

        let bad_email = CreateInviteRequest {
            recipient_email: Some("nope".into()),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let zero_usage = CreateInviteRequest {
            max_usage: Some(0),
            ..valid
        };
        assert!(zero_usage.validate().is_err());
    }

    #[test]
    fn test_summary_serializes_observed_status() {
        let now = Utc::now();
        let inv = invite(InviteStatus::Active, Some(now - Duration::hours(1)), 0, None);
        let json = serde_json::to_value(InviteSummary::observe(inv, now)).unwrap();
        assert_eq!(json["status"], "expired");
        assert_eq!(json["usageCount"], 0);
    }
}
