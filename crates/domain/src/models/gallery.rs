//! Gallery models. Galleries are owned by the media subsystem; the access
//! core only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A private media collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Gallery metadata attached to a redeemed invite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySummary {
    pub id: Uuid,
    pub title: String,
}

impl From<&Gallery> for GallerySummary {
    fn from(gallery: &Gallery) -> Self {
        Self {
            id: gallery.id,
            title: gallery.title.clone(),
        }
    }
}
