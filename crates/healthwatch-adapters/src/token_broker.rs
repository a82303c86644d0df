//! Token Broker (C1, §4.1): keeps at most one live credential pair, backed
//! by the `credentials` table, and refreshes it ahead of expiry. Grounded in
//! the teacher's MS Graph client-credentials flow (`ms_graph.rs`), adapted
//! from a blocking single-token cache to an async one with a single
//! in-flight refresh shared across every caller.

use chrono::{Duration, Utc};
use healthwatch_core::entities::CredentialRecord;
use healthwatch_core::error::{HealthWatchError, Result};
use healthwatch_core::store::Store;
use std::sync::Arc;
use tokio::sync::Mutex;

const REFRESH_SKEW: Duration = Duration::seconds(60);

/// One broker per adapter identity (e.g. "analytics", "search_index"); each
/// owns its own row in `credentials` and its own refresh lock.
pub struct TokenBroker {
    adapter_name: String,
    store: Store,
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    refresh_lock: Mutex<()>,
}

impl TokenBroker {
    pub fn new(
        adapter_name: impl Into<String>,
        store: Store,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            adapter_name: adapter_name.into(),
            store,
            http: reqwest::Client::new(),
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Returns a non-expired access token, refreshing if `now >= expires_at - 60s`.
    /// Only one refresh is in flight per broker; racing callers share it.
    pub async fn get_access_token(&self) -> Result<String> {
        let existing = self.store.credential(&self.adapter_name).await?;
        if let Some(ref cred) = existing {
            if Utc::now() < cred.expires_at - REFRESH_SKEW {
                return Ok(cred.access_token.clone());
            }
        }

        let _permit = self.refresh_lock.lock().await;
        // Re-check after acquiring the lock: another caller may have refreshed
        // while we were waiting.
        let existing = self.store.credential(&self.adapter_name).await?;
        if let Some(ref cred) = existing {
            if Utc::now() < cred.expires_at - REFRESH_SKEW {
                return Ok(cred.access_token.clone());
            }
        }
        let existing = existing.ok_or_else(|| {
            HealthWatchError::Auth(format!("no credential row for adapter '{}'", self.adapter_name))
        })?;
        self.refresh(existing).await
    }

    async fn refresh(&self, existing: CredentialRecord) -> Result<String> {
        let resp = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", existing.refresh_token.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HealthWatchError::Auth(format!(
                "token refresh for '{}' failed with status {}",
                self.adapter_name,
                resp.status()
            )));
        }
        let body: TokenResponse = resp.json().await.map_err(|e| HealthWatchError::Auth(e.to_string()))?;
        let new_record = CredentialRecord {
            access_token: body.access_token,
            refresh_token: body.refresh_token.unwrap_or(existing.refresh_token),
            expires_at: Utc::now() + Duration::seconds(body.expires_in.unwrap_or(3600)),
            scope: body
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or(existing.scope),
        };
        self.store.put_credential(&self.adapter_name, &new_record).await?;
        tracing::info!(adapter = %self.adapter_name, "refreshed access token");
        Ok(new_record.access_token)
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}
