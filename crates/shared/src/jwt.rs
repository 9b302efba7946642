//! Signed credential issuing and verification.
//!
//! Credentials are JWTs signed with the process-wide secret (HS256). RS256 key
//! pairs are supported for deployments that verify tokens in other services.
//! Issuing and verifying never touch storage.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::capability::{CapabilityBundle, Role};

/// Minimum length of an HMAC signing secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Reference credential lifetime: 7 days.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default clock skew tolerance. Zero, so a token is rejected the moment it expires.
pub const DEFAULT_LEEWAY_SECS: u64 = 0;

/// Error type for credential operations.
///
/// `Expired`, `Malformed` and `SignatureInvalid` must all be treated as
/// "unauthenticated"; the distinction only feeds logs and metrics.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl TokenError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Expired => "expired",
            TokenError::Malformed(_) => "malformed",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::InvalidClaims(_) => "invalid_claims",
            TokenError::Encoding(_) => "encoding",
            TokenError::InvalidKey(_) => "invalid_key",
        }
    }
}

/// Identity and capability claims supplied by the caller when minting a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPayload {
    pub subject_id: Uuid,
    pub email: String,
    pub role: Role,
    pub owner_profile_id: Option<Uuid>,
    pub guest_profile_id: Option<Uuid>,
    pub permissions: CapabilityBundle,
}

impl CredentialPayload {
    /// Checks the structural rules every credential must satisfy.
    pub fn check(&self) -> Result<(), TokenError> {
        if self.subject_id.is_nil() {
            return Err(TokenError::InvalidClaims("missing subject id".into()));
        }
        match self.role {
            Role::Guest => {
                if self.guest_profile_id.is_none() {
                    return Err(TokenError::InvalidClaims(
                        "guest credential requires a guest profile".into(),
                    ));
                }
            }
            Role::Owner | Role::Admin => {
                if self.email.trim().is_empty() {
                    return Err(TokenError::InvalidClaims(format!(
                        "{} credential requires an email",
                        self.role
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Signed claims as carried inside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity ID)
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_profile_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_profile_id: Option<Uuid>,
    pub permissions: CapabilityBundle,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

impl Claims {
    /// The caller-supplied part of the claims.
    pub fn payload(&self) -> CredentialPayload {
        CredentialPayload {
            subject_id: self.sub,
            email: self.email.clone(),
            role: self.role,
            owner_profile_id: self.owner_profile_id,
            guest_profile_id: self.guest_profile_id,
            permissions: self.permissions,
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.iat)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.exp)
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A freshly signed credential.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies credentials with the process-wide signing key.
///
/// Constructed once at startup and shared read-only by every request handler.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    /// Credential lifetime in seconds (default: 604800 = 7 days)
    pub ttl_secs: i64,
    /// Leeway in seconds for clock skew tolerance (default: 0)
    pub leeway_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("ttl_secs", &self.ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenIssuer {
    /// Creates an HS256 issuer from a shared secret.
    pub fn from_secret(secret: &[u8], ttl_secs: i64, leeway_secs: u64) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::InvalidKey(format!(
                "secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            ttl_secs,
            leeway_secs,
        })
    }

    /// Creates an RS256 issuer from an RSA key pair in PEM format.
    pub fn from_rsa_pem(
        private_key_pem: &str,
        public_key_pem: &str,
        ttl_secs: i64,
        leeway_secs: u64,
    ) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("Invalid private key: {}", e)))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::RS256,
            ttl_secs,
            leeway_secs,
        })
    }

    /// Signs `payload`, stamping it with the current time and the configured lifetime.
    pub fn issue(&self, payload: CredentialPayload) -> Result<SignedToken, TokenError> {
        self.issue_at(payload, Utc::now())
    }

    /// Signs `payload` as if issued at `issued_at`.
    pub fn issue_at(
        &self,
        payload: CredentialPayload,
        issued_at: DateTime<Utc>,
    ) -> Result<SignedToken, TokenError> {
        payload.check()?;

        let expires_at = issued_at + Duration::seconds(self.ttl_secs);
        let claims = Claims {
            sub: payload.subject_id,
            email: payload.email,
            role: payload.role,
            owner_profile_id: payload.owner_profile_id,
            guest_profile_id: payload.guest_profile_id,
            permissions: payload.permissions,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(SignedToken {
            token,
            issued_at: timestamp_to_datetime(claims.iat),
            expires_at: timestamp_to_datetime(claims.exp),
        })
    }

    /// Checks signature integrity, then expiry, and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        // A correctly signed token with impossible claims was not minted by `issue`.
        data.claims
            .payload()
            .check()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        Ok(data.claims)
    }
}
