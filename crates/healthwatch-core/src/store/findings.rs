//! Findings (§3, §4.9): one row per investigated anomaly. The dedup
//! pre-check in the agent loop (§4.9) queries for any existing finding on a
//! page whose status is in `FindingStatus::DEDUP_BLOCKING`.

use super::Store;
use crate::entities::{Finding, FindingStatus};
use crate::error::Result;
use uuid::Uuid;

impl Store {
    pub async fn insert_finding(&self, finding: &Finding) -> Result<()> {
        let row = serde_json::to_value(finding)?;
        self.client.insert("findings", &[row]).await
    }

    /// Any finding on `page_url` whose status blocks a new investigation.
    pub async fn blocking_finding_for_page(&self, page_url: &str) -> Result<Option<Finding>> {
        for status in FindingStatus::DEDUP_BLOCKING {
            let status_str = serde_json::to_value(status)?
                .as_str()
                .unwrap_or_default()
                .to_string();
            let rows: Vec<Finding> = self
                .client
                .select(
                    "findings",
                    &[("page_url", page_url.to_string()), ("status", status_str)],
                    &["limit=1"],
                )
                .await?;
            if let Some(f) = rows.into_iter().next() {
                return Ok(Some(f));
            }
        }
        Ok(None)
    }

    pub async fn update_finding_status(&self, id: Uuid, status: FindingStatus) -> Result<()> {
        let patch = serde_json::json!({ "status": status });
        self.client.update("findings", &[("id", id.to_string())], &patch).await
    }

    pub async fn finding_by_id(&self, id: Uuid) -> Result<Option<Finding>> {
        let rows: Vec<Finding> = self
            .client
            .select("findings", &[("id", id.to_string())], &["limit=1"])
            .await?;
        Ok(rows.into_iter().next())
    }
}
