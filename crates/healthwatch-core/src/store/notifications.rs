//! Notifications (§3): append-only, one row per severity-worthy finding.

use super::Store;
use crate::entities::Notification;
use crate::error::Result;

impl Store {
    pub async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let row = serde_json::to_value(notification)?;
        self.client.insert("notifications", &[row]).await
    }

    pub async fn unread_notifications(&self) -> Result<Vec<Notification>> {
        self.client
            .select("notifications", &[], &["read_at=is.null", "order=created_at.desc"])
            .await
    }
}
