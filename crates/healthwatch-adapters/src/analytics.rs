//! Analytics adapter (§4.2): page-level traffic metrics with a
//! period-over-period comparison, a traffic-sources breakdown, and a
//! key-events enumeration. Backed by the GA4 Data API's `runReport`.

use chrono::NaiveDate;
use healthwatch_core::entities::{AnalyticsSnapshot, KeyEvent, TrafficSourceBreakdown};
use healthwatch_core::error::{HealthWatchError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::TokenBroker;

pub struct AnalyticsAdapter {
    http: reqwest::Client,
    token_broker: Arc<TokenBroker>,
    property_id: String,
}

struct WindowRow {
    page_path: String,
    active_users: u64,
    sessions: u64,
    page_views: u64,
    bounce_rate: f64,
    avg_session_duration: f64,
}

impl AnalyticsAdapter {
    pub fn new(token_broker: Arc<TokenBroker>, property_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_broker,
            property_id: property_id.into(),
        }
    }

    /// Runs two independent report queries and merges by page path. A
    /// partial or empty `Vec` is returned (never an error) when the remote
    /// call itself succeeds but a single page is missing from one window —
    /// only a token or transport failure propagates.
    pub async fn page_metrics_with_comparison(
        &self,
        current: (NaiveDate, NaiveDate),
        previous: (NaiveDate, NaiveDate),
        cancel: &CancellationToken,
    ) -> Result<Vec<AnalyticsSnapshot>> {
        let current_rows = self.run_report(current, cancel).await?;
        let previous_rows = self.run_report(previous, cancel).await.unwrap_or_default();

        let prev_by_path: HashMap<String, WindowRow> =
            previous_rows.into_iter().map(|r| (r.page_path.clone(), r)).collect();

        Ok(current_rows
            .into_iter()
            .map(|row| {
                let prev = prev_by_path.get(&row.page_path);
                let users_previous_period = prev.map(|p| p.active_users).unwrap_or(0);
                let sessions_previous_period = prev.map(|p| p.sessions).unwrap_or(0);
                AnalyticsSnapshot {
                    page_url: row.page_path,
                    snapshot_date: current.1,
                    active_users: row.active_users,
                    sessions: row.sessions,
                    page_views: row.page_views,
                    bounce_rate: row.bounce_rate,
                    avg_session_duration: row.avg_session_duration,
                    users_previous_period,
                    sessions_previous_period,
                    traffic_change_pct: AnalyticsSnapshot::compute_traffic_change_pct(
                        row.active_users,
                        users_previous_period,
                    ),
                }
            })
            .collect())
    }

    pub async fn traffic_sources_breakdown(
        &self,
        page_path: &str,
        window: (NaiveDate, NaiveDate),
        cancel: &CancellationToken,
    ) -> Result<TrafficSourceBreakdown> {
        let token = self.token_broker.get_access_token().await?;
        let body = serde_json::json!({
            "dateRanges": [{"startDate": window.0, "endDate": window.1}],
            "dimensions": [{"name": "sessionDefaultChannelGroup"}],
            "metrics": [{"name": "activeUsers"}],
            "dimensionFilter": {
                "filter": {"fieldName": "pagePath", "stringFilter": {"value": page_path}}
            },
        });
        let resp = tokio::select! {
            r = self.run_query(&token, &body) => r?,
            _ = cancel.cancelled() => return Ok(TrafficSourceBreakdown::default()),
        };
        let mut out = TrafficSourceBreakdown::default();
        for row in resp.rows.unwrap_or_default() {
            let channel = row.dimension_values.first().map(|v| v.value.as_str()).unwrap_or("");
            let users: u64 = row
                .metric_values
                .first()
                .and_then(|v| v.value.parse().ok())
                .unwrap_or(0);
            match channel.to_lowercase().as_str() {
                c if c.contains("organic") => out.organic += users,
                c if c.contains("paid") => out.paid += users,
                c if c.contains("direct") => out.direct += users,
                c if c.contains("referral") => out.referral += users,
                c if c.contains("social") => out.social += users,
                _ => {}
            }
        }
        Ok(out)
    }

    pub async fn key_events(&self, window: (NaiveDate, NaiveDate)) -> Result<Vec<KeyEvent>> {
        let token = self.token_broker.get_access_token().await?;
        let body = serde_json::json!({
            "dateRanges": [{"startDate": window.0, "endDate": window.1}],
            "dimensions": [{"name": "eventName"}],
            "metrics": [{"name": "keyEvents"}],
        });
        let resp = self.run_query(&token, &body).await?;
        Ok(resp
            .rows
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| {
                let name = row.dimension_values.first()?.value.clone();
                let count: u64 = row.metric_values.first()?.value.parse().ok()?;
                Some(KeyEvent { name, count })
            })
            .collect())
    }

    async fn run_report(&self, window: (NaiveDate, NaiveDate), cancel: &CancellationToken) -> Result<Vec<WindowRow>> {
        let token = self.token_broker.get_access_token().await?;
        let body = serde_json::json!({
            "dateRanges": [{"startDate": window.0, "endDate": window.1}],
            "dimensions": [{"name": "pagePath"}],
            "metrics": [
                {"name": "activeUsers"},
                {"name": "sessions"},
                {"name": "screenPageViews"},
                {"name": "bounceRate"},
                {"name": "averageSessionDuration"},
            ],
        });
        let resp = tokio::select! {
            r = self.run_query(&token, &body) => r?,
            _ = cancel.cancelled() => return Ok(vec![]),
        };
        Ok(resp
            .rows
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| {
                let page_path = row.dimension_values.first()?.value.clone();
                let mv = &row.metric_values;
                Some(WindowRow {
                    page_path,
                    active_users: mv.first()?.value.parse().ok()?,
                    sessions: mv.get(1)?.value.parse().ok()?,
                    page_views: mv.get(2)?.value.parse().ok()?,
                    bounce_rate: mv.get(3)?.value.parse().ok()?,
                    avg_session_duration: mv.get(4)?.value.parse().ok()?,
                })
            })
            .collect())
    }

    async fn run_query(&self, token: &str, body: &serde_json::Value) -> Result<RunReportResponse> {
        let url = format!(
            "https://analyticsdata.googleapis.com/v1beta/properties/{}:runReport",
            self.property_id
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
                "analytics report request failed with status {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))
    }
}

#[derive(serde::Deserialize)]
struct RunReportResponse {
    rows: Option<Vec<ReportRow>>,
}

#[derive(serde::Deserialize)]
struct ReportRow {
    #[serde(rename = "dimensionValues", default)]
    dimension_values: Vec<ReportValue>,
    #[serde(rename = "metricValues", default)]
    metric_values: Vec<ReportValue>,
}

#[derive(serde::Deserialize)]
struct ReportValue {
    value: String,
}
