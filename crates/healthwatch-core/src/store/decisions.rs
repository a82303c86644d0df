//! Decision queue (§3, §4.9): human-reviewable recommendations. The review
//! endpoint (§4.10) must transition `pending -> approved|rejected` exactly
//! once; a second review on the same item is a `ReviewConflict` (§7).

use super::Store;
use crate::entities::{DecisionQueueItem, QueueStatus};
use crate::error::{HealthWatchError, Result};
use uuid::Uuid;

impl Store {
    pub async fn insert_decision(&self, item: &DecisionQueueItem) -> Result<()> {
        let row = serde_json::to_value(item)?;
        self.client.insert("decision_queue", &[row]).await
    }

    pub async fn decision_by_id(&self, id: Uuid) -> Result<Option<DecisionQueueItem>> {
        let rows: Vec<DecisionQueueItem> = self
            .client
            .select("decision_queue", &[("id", id.to_string())], &["limit=1"])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Conditional transition: fails with `ReviewConflict` unless the item is
    /// still `pending` at the time of the read (§4.10 "review is not
    /// idempotent"). Not a true compare-and-swap against the store, but the
    /// read-then-write pairing the teacher's knowledge store uses for its
    /// single-writer workloads.
    pub async fn review_decision(
        &self,
        id: Uuid,
        new_status: QueueStatus,
        reviewer: &str,
        review_notes: Option<&str>,
    ) -> Result<DecisionQueueItem> {
        let current = self
            .decision_by_id(id)
            .await?
            .ok_or_else(|| HealthWatchError::Data(format!("decision {id} not found")))?;
        if current.status != QueueStatus::Pending {
            return Err(HealthWatchError::ReviewConflict(id.to_string()));
        }
        let patch = serde_json::json!({
            "status": new_status,
            "reviewer": reviewer,
            "review_notes": review_notes,
            "reviewed_at": chrono::Utc::now(),
        });
        self.client.update("decision_queue", &[("id", id.to_string())], &patch).await?;
        let mut updated = current;
        updated.status = new_status;
        updated.reviewer = Some(reviewer.to_string());
        updated.review_notes = review_notes.map(str::to_string);
        updated.reviewed_at = Some(chrono::Utc::now());
        Ok(updated)
    }

    pub async fn pending_decisions(&self) -> Result<Vec<DecisionQueueItem>> {
        self.client
            .select(
                "decision_queue",
                &[("status", "pending".to_string())],
                &["order=priority.desc,created_at.asc"],
            )
            .await
    }
}
