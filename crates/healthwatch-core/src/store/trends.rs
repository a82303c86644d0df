//! Trend snapshots (§3, §4.11 step 6): one row per period, used by the
//! weekly digest narrative to compare this period against the last.

use super::Store;
use crate::entities::{PeriodType, TrendSnapshot};
use crate::error::Result;

impl Store {
    pub async fn insert_trend_snapshot(&self, snapshot: &TrendSnapshot) -> Result<()> {
        let row = serde_json::to_value(snapshot)?;
        self.client.insert("trend_snapshots", &[row]).await
    }

    pub async fn latest_trend_snapshot(&self, period_type: PeriodType) -> Result<Option<TrendSnapshot>> {
        let period_str = serde_json::to_value(period_type)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let rows: Vec<TrendSnapshot> = self
            .client
            .select(
                "trend_snapshots",
                &[("period_type", period_str)],
                &["order=period_end.desc", "limit=1"],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// The snapshot immediately preceding the most recent one, used for
    /// period-over-period deltas in the digest narrative.
    pub async fn previous_trend_snapshot(&self, period_type: PeriodType) -> Result<Option<TrendSnapshot>> {
        let period_str = serde_json::to_value(period_type)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let rows: Vec<TrendSnapshot> = self
            .client
            .select(
                "trend_snapshots",
                &[("period_type", period_str)],
                &["order=period_end.desc", "limit=2"],
            )
            .await?;
        Ok(rows.into_iter().nth(1))
    }
}
