//! Snapshot Store (C4, §4.4): analytics, search, speed, and link-health
//! rows. Analytics/search are upserted by their natural key
//! `(page_url, snapshot_date)`; speed scores are append-only; link health is
//! upserted by `(source_page_url, target_url)`.

use super::Store;
use crate::entities::{AnalyticsSnapshot, LinkHealthRecord, SearchSnapshot, SpeedScore};
use crate::error::Result;

const UPSERT_CHUNK: usize = 100;

impl Store {
    pub async fn upsert_analytics_snapshots(&self, rows: &[AnalyticsSnapshot]) -> Result<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let values: Vec<serde_json::Value> =
                chunk.iter().map(serde_json::to_value).collect::<std::result::Result<_, _>>()?;
            self.client
                .upsert("analytics_snapshots", &values, "page_url,snapshot_date")
                .await?;
        }
        Ok(())
    }

    pub async fn upsert_search_snapshots(&self, rows: &[SearchSnapshot]) -> Result<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let values: Vec<serde_json::Value> =
                chunk.iter().map(serde_json::to_value).collect::<std::result::Result<_, _>>()?;
            self.client
                .upsert("search_snapshots", &values, "page_url,snapshot_date")
                .await?;
        }
        Ok(())
    }

    pub async fn insert_speed_scores(&self, rows: &[SpeedScore]) -> Result<()> {
        let values: Vec<serde_json::Value> =
            rows.iter().map(serde_json::to_value).collect::<std::result::Result<_, _>>()?;
        self.client.insert("speed_scores", &values).await
    }

    pub async fn upsert_link_health(&self, rows: &[LinkHealthRecord]) -> Result<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let values: Vec<serde_json::Value> =
                chunk.iter().map(serde_json::to_value).collect::<std::result::Result<_, _>>()?;
            self.client
                .upsert("link_health", &values, "source_page_url,target_url")
                .await?;
        }
        Ok(())
    }

    pub async fn broken_links_for_page(&self, page_url: &str) -> Result<Vec<LinkHealthRecord>> {
        self.client
            .select(
                "link_health",
                &[("source_page_url", page_url.to_string()), ("is_broken", "true".to_string())],
                &[],
            )
            .await
    }

    pub async fn latest_analytics(&self, page_url: &str, limit: u32) -> Result<Vec<AnalyticsSnapshot>> {
        self.client
            .select(
                "analytics_snapshots",
                &[("page_url", page_url.to_string())],
                &["order=snapshot_date.desc", &format!("limit={limit}")],
            )
            .await
    }

    pub async fn latest_search(&self, page_url: &str, limit: u32) -> Result<Vec<SearchSnapshot>> {
        self.client
            .select(
                "search_snapshots",
                &[("page_url", page_url.to_string())],
                &["order=snapshot_date.desc", &format!("limit={limit}")],
            )
            .await
    }

    /// Most recent speed score per page, per §4.4's "latest speed score per
    /// page, grouped by url" query.
    pub async fn latest_speed_score(&self, page_url: &str) -> Result<Option<SpeedScore>> {
        let rows: Vec<SpeedScore> = self
            .client
            .select(
                "speed_scores",
                &[("page_url", page_url.to_string())],
                &["order=tested_at.desc", "limit=1"],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// All active pages' most recent speed score, used by the scorer's
    /// speed-by-url lookup map (§4.8 step 9).
    pub async fn all_latest_speed_scores(&self) -> Result<Vec<SpeedScore>> {
        self.client
            .select("speed_scores", &[], &["order=tested_at.desc"])
            .await
    }
}
