//! Conversion audit (§3, §4.11 step 2): weekly tracking-health sweep.

use super::Store;
use crate::entities::ConversionAudit;
use crate::error::Result;

impl Store {
    pub async fn insert_conversion_audit(&self, audit: &ConversionAudit) -> Result<()> {
        let row = serde_json::to_value(audit)?;
        self.client.insert("conversion_audit", &[row]).await
    }

    pub async fn latest_conversion_audit(&self) -> Result<Option<ConversionAudit>> {
        let rows: Vec<ConversionAudit> = self
            .client
            .select("conversion_audit", &[], &["order=period_end.desc", "limit=1"])
            .await?;
        Ok(rows.into_iter().next())
    }
}
