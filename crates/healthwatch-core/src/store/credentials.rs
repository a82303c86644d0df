//! Single-row credential store backing the Token Broker (C1, §4.1). There is
//! exactly one live credential set per adapter name at a time; refresh
//! replaces the row in place.

use super::Store;
use crate::entities::CredentialRecord;
use crate::error::Result;

impl Store {
    pub async fn credential(&self, adapter_name: &str) -> Result<Option<CredentialRecord>> {
        let rows: Vec<CredentialRecord> = self
            .client
            .select("credentials", &[("adapter_name", adapter_name.to_string())], &["limit=1"])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Upsert keyed by `adapter_name`, the table's natural key.
    pub async fn put_credential(&self, adapter_name: &str, record: &CredentialRecord) -> Result<()> {
        let mut row = serde_json::to_value(record)?;
        row["adapter_name"] = serde_json::Value::String(adapter_name.to_string());
        self.client.upsert("credentials", &[row], "adapter_name").await
    }
}
