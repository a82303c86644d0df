//! Guardrails (§3, §4.9): operator-authored rules evaluated before any
//! recommendation leaves the agent loop.

use super::Store;
use crate::entities::Guardrail;
use crate::error::Result;

impl Store {
    pub async fn active_guardrails(&self) -> Result<Vec<Guardrail>> {
        self.client
            .select("guardrails", &[("active", "true".to_string())], &[])
            .await
    }
}
