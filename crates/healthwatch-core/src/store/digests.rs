//! Weekly digest (§3, §4.11 step 9): the human-facing narrative produced at
//! the end of the weekly orchestrator run.

use super::Store;
use crate::entities::WeeklyDigest;
use crate::error::Result;

impl Store {
    pub async fn insert_weekly_digest(&self, digest: &WeeklyDigest) -> Result<()> {
        let row = serde_json::to_value(digest)?;
        self.client.insert("weekly_digest", &[row]).await
    }

    pub async fn latest_weekly_digest(&self) -> Result<Option<WeeklyDigest>> {
        let rows: Vec<WeeklyDigest> = self
            .client
            .select("weekly_digest", &[], &["order=period_end.desc", "limit=1"])
            .await?;
        Ok(rows.into_iter().next())
    }
}
