//! Search-index adapter (§4.2): per-page aggregated clicks, impressions,
//! CTR, and position with comparison; bounded top-queries; per-page detail.
//! Backed by the Search Console `searchanalytics/query` endpoint. Lower
//! position is better; `position_change` is sign-flipped so positive means
//! improved (§3).

use chrono::NaiveDate;
use healthwatch_core::entities::{SearchSnapshot, TopQuery};
use healthwatch_core::error::{HealthWatchError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::TokenBroker;

const MAX_TOP_QUERIES: usize = 25;

pub struct SearchIndexAdapter {
    http: reqwest::Client,
    token_broker: Arc<TokenBroker>,
    site_url: String,
}

struct PageRow {
    page_url: String,
    clicks: u64,
    impressions: u64,
    ctr: f64,
    position: f64,
}

impl SearchIndexAdapter {
    pub fn new(token_broker: Arc<TokenBroker>, site_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_broker,
            site_url: site_url.into(),
        }
    }

    pub async fn page_metrics_with_comparison(
        &self,
        current: (NaiveDate, NaiveDate),
        previous: (NaiveDate, NaiveDate),
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchSnapshot>> {
        let current_rows = self.query_by_page(current, cancel).await?;
        let previous_rows = self.query_by_page(previous, cancel).await.unwrap_or_default();
        let prev_by_url: HashMap<String, PageRow> =
            previous_rows.into_iter().map(|r| (r.page_url.clone(), r)).collect();

        Ok(current_rows
            .into_iter()
            .map(|row| {
                let prev = prev_by_url.get(&row.page_url);
                let previous_position = prev.map(|p| p.position).unwrap_or(0.0);
                SearchSnapshot {
                    page_url: row.page_url,
                    snapshot_date: current.1,
                    total_clicks: row.clicks,
                    total_impressions: row.impressions,
                    avg_ctr: row.ctr,
                    avg_position: row.position,
                    previous_clicks: prev.map(|p| p.clicks).unwrap_or(0),
                    previous_impressions: prev.map(|p| p.impressions).unwrap_or(0),
                    previous_ctr: prev.map(|p| p.ctr).unwrap_or(0.0),
                    previous_position,
                    position_change: SearchSnapshot::compute_position_change(previous_position, row.position),
                }
            })
            .collect())
    }

    pub async fn top_queries_for_page(
        &self,
        page_url: &str,
        window: (NaiveDate, NaiveDate),
    ) -> Result<Vec<TopQuery>> {
        let token = self.token_broker.get_access_token().await?;
        let body = serde_json::json!({
            "startDate": window.0,
            "endDate": window.1,
            "dimensions": ["query"],
            "dimensionFilterGroups": [{
                "filters": [{"dimension": "page", "operator": "equals", "expression": page_url}]
            }],
            "rowLimit": MAX_TOP_QUERIES,
        });
        let resp = self.run_query(&token, &body).await?;
        Ok(resp
            .rows
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(TopQuery {
                    query: r.keys?.into_iter().next()?,
                    clicks: r.clicks as u64,
                    impressions: r.impressions as u64,
                    position: r.position,
                })
            })
            .take(MAX_TOP_QUERIES)
            .collect())
    }

    /// Matches the `contains` filter used by the weekly keyword-coverage
    /// sweep (§4.11 step 6).
    pub async fn query_contains(&self, keyword: &str, window: (NaiveDate, NaiveDate)) -> Result<Vec<TopQuery>> {
        let token = self.token_broker.get_access_token().await?;
        let body = serde_json::json!({
            "startDate": window.0,
            "endDate": window.1,
            "dimensions": ["query", "page"],
            "dimensionFilterGroups": [{
                "filters": [{"dimension": "query", "operator": "contains", "expression": keyword}]
            }],
            "rowLimit": MAX_TOP_QUERIES,
        });
        let resp = self.run_query(&token, &body).await?;
        Ok(resp
            .rows
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let keys = r.keys?;
                Some(TopQuery {
                    query: keys.first()?.clone(),
                    clicks: r.clicks as u64,
                    impressions: r.impressions as u64,
                    position: r.position,
                })
            })
            .collect())
    }

    async fn query_by_page(&self, window: (NaiveDate, NaiveDate), cancel: &CancellationToken) -> Result<Vec<PageRow>> {
        let token = self.token_broker.get_access_token().await?;
        let body = serde_json::json!({
            "startDate": window.0,
            "endDate": window.1,
            "dimensions": ["page"],
            "rowLimit": 5000,
        });
        let resp = tokio::select! {
            r = self.run_query(&token, &body) => r?,
            _ = cancel.cancelled() => return Ok(vec![]),
        };
        Ok(resp
            .rows
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(PageRow {
                    page_url: r.keys?.into_iter().next()?,
                    clicks: r.clicks as u64,
                    impressions: r.impressions as u64,
                    ctr: r.ctr,
                    position: r.position,
                })
            })
            .collect())
    }

    async fn run_query(&self, token: &str, body: &serde_json::Value) -> Result<SearchAnalyticsResponse> {
        let url = format!(
            "https://www.googleapis.com/webmasters/v3/sites/{}/searchAnalytics/query",
            urlencode(&self.site_url)
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(20))
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HealthWatchError::Remote(format!(
                "search index query failed with status {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(serde::Deserialize)]
struct SearchAnalyticsResponse {
    rows: Option<Vec<SearchAnalyticsRow>>,
}

#[derive(serde::Deserialize)]
struct SearchAnalyticsRow {
    keys: Option<Vec<String>>,
    clicks: f64,
    impressions: f64,
    ctr: f64,
    position: f64,
}
