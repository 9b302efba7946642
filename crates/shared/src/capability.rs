//! Roles and capability bundles carried by every credential.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actor class of an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Guest => "guest",
        }
    }

    /// Returns true if this role may sign in with a password.
    pub fn can_use_password(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Returns true if this role may manage invites of galleries it does not own.
    pub fn manages_any_gallery(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "guest" => Ok(Role::Guest),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fine-grained permissions granted to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityBundle {
    pub can_view: bool,
    pub can_favorite: bool,
    pub can_comment: bool,
    pub can_download: bool,
    pub can_request_purchase: bool,
}

impl CapabilityBundle {
    /// Every capability granted. Owners and admins carry this bundle.
    pub const fn all() -> Self {
        Self {
            can_view: true,
            can_favorite: true,
            can_comment: true,
            can_download: true,
            can_request_purchase: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            can_view: false,
            can_favorite: false,
            can_comment: false,
            can_download: false,
            can_request_purchase: false,
        }
    }

    /// The default bundle for a new invite: view and favorite.
    pub const fn default_invite() -> Self {
        Self {
            can_view: true,
            can_favorite: true,
            can_comment: false,
            can_download: false,
            can_request_purchase: false,
        }
    }

    fn as_array(&self) -> [bool; 5] {
        [
            self.can_view,
            self.can_favorite,
            self.can_comment,
            self.can_download,
            self.can_request_purchase,
        ]
    }

    /// Returns true if every capability granted here is also granted by `other`.
    pub fn is_subset_of(&self, other: &CapabilityBundle) -> bool {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .all(|(mine, theirs)| !mine || *theirs)
    }

    /// Capabilities granted by both bundles.
    pub fn intersect(&self, other: &CapabilityBundle) -> CapabilityBundle {
        CapabilityBundle {
            can_view: self.can_view && other.can_view,
            can_favorite: self.can_favorite && other.can_favorite,
            can_comment: self.can_comment && other.can_comment,
            can_download: self.can_download && other.can_download,
            can_request_purchase: self.can_request_purchase && other.can_request_purchase,
        }
    }

    /// Names of the granted capabilities, used in notification copy.
    pub fn granted_names(&self) -> Vec<&'static str> {
        const NAMES: [&str; 5] = ["view", "favorite", "comment", "download", "request purchase"];
        NAMES
            .iter()
            .zip(self.as_array())
            .filter_map(|(name, granted)| granted.then_some(*name))
            .collect()
    }
}
