//! Invite notification dispatch.
//!
//! Delivery is best-effort: a failed send is logged by the caller and never
//! rolls back invite creation.

use serde::Serialize;
use shared::capability::CapabilityBundle;
use std::sync::Mutex;

/// Payload of an invite notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteNotification {
    pub recipient_email: String,
    pub gallery_title: String,
    pub granter_name: String,
    pub access_url: String,
    pub capabilities: CapabilityBundle,
}

/// Sends invite notifications to recipients.
#[async_trait::async_trait]
pub trait InviteNotifier: Send + Sync {
    /// Returns `true` when the notification was handed off for delivery.
    async fn send_invite_notification(&self, notification: InviteNotification) -> bool;
}

/// Mock notifier for development and testing.
///
/// Logs notifications instead of sending them and keeps a copy of each.
#[derive(Debug, Default)]
pub struct MockInviteNotifier {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Mutex<Vec<InviteNotification>>,
}

impl MockInviteNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Notifications accepted so far.
    pub fn sent(&self) -> Vec<InviteNotification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl InviteNotifier for MockInviteNotifier {
    async fn send_invite_notification(&self, notification: InviteNotification) -> bool {
        if self.simulate_failure {
            tracing::warn!(
                gallery_title = %notification.gallery_title,
                "Mock invite notifier simulating failure"
            );
            return false;
        }

        tracing::info!(
            gallery_title = %notification.gallery_title,
            granter = %notification.granter_name,
            capabilities = ?notification.capabilities.granted_names(),
            "Mock: Would send invite notification"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
        true
    }
}
