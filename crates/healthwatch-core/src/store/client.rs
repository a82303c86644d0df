//! A thin PostgREST client: every logical table in §6's persisted-state
//! layout is reachable over `{persistence_url}/rest/v1/{table}` with the
//! service key sent as both `apikey` and a bearer `Authorization` header —
//! the same shape the teacher's `KnowledgeStore` uses for its one REST
//! dependency, and the shape the pack's Supabase-backed adapters use
//! throughout (`apikey` header + service-role bearer token).

use crate::error::{HealthWatchError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl PostgrestClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into(),
            service_key: service_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
    }

    /// Plain insert, chunked by the caller. Used where natural-key conflicts
    /// are not expected (append-only tables: speed scores, change log,
    /// notifications, signals, trend snapshots, weekly digests).
    pub async fn insert(&self, table: &str, rows: &[Value]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let resp = self
            .auth(self.http.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        Self::check(resp, table).await
    }

    /// Idempotent upsert keyed by `on_conflict` (a comma-separated column
    /// list matching the table's natural key), used for the Snapshot Store
    /// (C4, §4.4) and Page Inventory (C5, §4.5) writes.
    pub async fn upsert(&self, table: &str, rows: &[Value], on_conflict: &str) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!("{}?on_conflict={}", self.table_url(table), on_conflict);
        let resp = self
            .auth(self.http.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        Self::check(resp, table).await
    }

    /// PATCH rows matching `filter` (PostgREST `column=eq.value` pairs).
    pub async fn update(&self, table: &str, filter: &[(&str, String)], patch: &Value) -> Result<()> {
        let mut url = self.table_url(table);
        url.push('?');
        url.push_str(&Self::filter_query(filter));
        let resp = self
            .auth(self.http.patch(&url))
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;
        Self::check(resp, table).await
    }

    /// GET rows matching `filter`, optionally ordered/limited via raw
    /// PostgREST query fragments (e.g. `order=created_at.desc`, `limit=50`).
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &[(&str, String)],
        extra: &[&str],
    ) -> Result<Vec<T>> {
        let mut url = self.table_url(table);
        url.push_str("?select=*");
        let f = Self::filter_query(filter);
        if !f.is_empty() {
            url.push('&');
            url.push_str(&f);
        }
        for e in extra {
            url.push('&');
            url.push_str(e);
        }
        let resp = self.auth(self.http.get(&url)).send().await?;
        let resp = Self::check_resp(resp, table)?;
        let rows: Vec<T> = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;
        Ok(rows)
    }

    fn filter_query(filter: &[(&str, String)]) -> String {
        filter
            .iter()
            .map(|(k, v)| format!("{}=eq.{}", k, urlencode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn check_resp(resp: reqwest::Response, table: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(HealthWatchError::Remote(format!(
                "store request to '{}' failed with status {}",
                table,
                resp.status()
            )))
        }
    }

    async fn check(resp: reqwest::Response, table: &str) -> Result<()> {
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(HealthWatchError::Remote(format!(
                "store write to '{}' failed with status {}: {}",
                table, status, body
            )))
        }
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
