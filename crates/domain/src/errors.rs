//! Domain error types.

use thiserror::Error;

/// Failure reported by a storage collaborator.
///
/// Implementations classify every backend failure as transient (worth
/// retrying) or terminal. `ServiceUnavailable` is only produced by the
/// store gateway once transient retries are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("Record not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Terminal(String),

    #[error("Storage unavailable after {attempts} attempts")]
    ServiceUnavailable { attempts: u32 },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Errors of the invite lifecycle and the authorization checks around it.
///
/// `NotFound`, `NotActive`, `Expired` and `UsageExceeded` are reported in
/// that order, first failing check wins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InviteError {
    #[error("Not allowed: {0}")]
    Unauthorized(String),

    #[error("Invite not found")]
    NotFound,

    #[error("Invite is not active")]
    NotActive,

    #[error("Invite has expired")]
    Expired,

    #[error("Invite usage limit reached")]
    UsageExceeded,

    #[error("Invite is no longer active")]
    AlreadyRevoked,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage is temporarily unavailable")]
    ServiceUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InviteError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InviteError::Unauthorized(_) => "unauthorized",
            InviteError::NotFound => "not_found",
            InviteError::NotActive => "not_active",
            InviteError::Expired => "expired",
            InviteError::UsageExceeded => "usage_exceeded",
            InviteError::AlreadyRevoked => "already_revoked",
            InviteError::Validation(_) => "validation",
            InviteError::ServiceUnavailable => "service_unavailable",
            InviteError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for InviteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => InviteError::NotFound,
            // A transient error that escaped the gateway is still an outage, never a 4xx.
            StoreError::Transient(_) | StoreError::ServiceUnavailable { .. } => {
                InviteError::ServiceUnavailable
            }
            StoreError::Conflict(msg) | StoreError::Terminal(msg) => InviteError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Transient("reset".into()).is_transient());
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::Terminal("syntax".into()).is_transient());
        assert!(!StoreError::ServiceUnavailable { attempts: 3 }.is_transient());
    }

    #[test]
    fn test_unavailable_never_becomes_not_found() {
        let err: InviteError = StoreError::ServiceUnavailable { attempts: 3 }.into();
        assert_eq!(err, InviteError::ServiceUnavailable);
        let err: InviteError = StoreError::Transient("timeout".into()).into();
        assert_eq!(err, InviteError::ServiceUnavailable);
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(InviteError::from(StoreError::NotFound), InviteError::NotFound);
        assert!(matches!(
            InviteError::from(StoreError::Conflict("dup".into())),
            InviteError::Internal(_)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::ServiceUnavailable { attempts: 3 }.to_string(),
            "Storage unavailable after 3 attempts"
        );
        assert_eq!(
            InviteError::AlreadyRevoked.to_string(),
            "Invite is no longer active"
        );
    }
}
