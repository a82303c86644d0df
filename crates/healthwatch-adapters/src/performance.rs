//! Performance tester adapter (§4.2): a full audit per (url, strategy),
//! extracting Core Web Vitals and up to 10 ranked opportunities. Backed by
//! the PageSpeed Insights API. Expensive — 15-25s per call — so the caller
//! is expected to rate-limit invocations, not this adapter.

use chrono::Utc;
use healthwatch_core::entities::{SpeedOpportunity, SpeedScore, SpeedStrategy};
use healthwatch_core::error::{HealthWatchError, Result};
use std::time::Duration;
use uuid::Uuid;

const MAX_OPPORTUNITIES: usize = 10;

pub struct PerformanceAdapter {
    http: reqwest::Client,
    api_key: String,
}

impl PerformanceAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.into(),
        }
    }

    pub async fn run_audit(&self, page_url: &str, strategy: SpeedStrategy) -> Result<SpeedScore> {
        let strategy_param = match strategy {
            SpeedStrategy::Mobile => "mobile",
            SpeedStrategy::Desktop => "desktop",
        };
        let resp = self
            .http
            .get("https://www.googleapis.com/pagespeedonline/v5/runPagespeed")
            .query(&[
                ("url", page_url),
                ("key", self.api_key.as_str()),
                ("strategy", strategy_param),
                ("category", "PERFORMANCE"),
                ("category", "ACCESSIBILITY"),
                ("category", "SEO"),
                ("category", "BEST_PRACTICES"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HealthWatchError::Remote(format!(
                "performance audit for '{}' failed with status {}",
                page_url,
                resp.status()
            )));
        }
        let body: PagespeedResponse = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;
        let categories = body
            .lighthouse_result
            .as_ref()
            .map(|r| &r.categories)
            .ok_or_else(|| HealthWatchError::Data("missing lighthouseResult".to_string()))?;
        let audits = body
            .lighthouse_result
            .as_ref()
            .map(|r| &r.audits)
            .cloned()
            .unwrap_or_default();

        let mut opportunities: Vec<(f64, SpeedOpportunity)> = audits
            .values()
            .filter(|a| a.details.as_ref().map(|d| d.kind.as_deref() == Some("opportunity")).unwrap_or(false))
            .filter_map(|a| {
                let savings_ms = a.details.as_ref().and_then(|d| d.overall_savings_ms);
                Some((
                    savings_ms.unwrap_or(0.0),
                    SpeedOpportunity {
                        title: a.title.clone()?,
                        description: a.description.clone().unwrap_or_default(),
                        estimated_savings_ms: savings_ms.map(|v| v as u32),
                    },
                ))
            })
            .collect();
        opportunities.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        opportunities.truncate(MAX_OPPORTUNITIES);

        Ok(SpeedScore {
            id: Uuid::new_v4(),
            page_url: page_url.to_string(),
            test_date: Utc::now().date_naive(),
            strategy,
            performance_score: category_score(categories, "performance"),
            accessibility_score: category_score(categories, "accessibility"),
            seo_score: category_score(categories, "seo"),
            best_practices_score: category_score(categories, "best-practices"),
            lcp_ms: metric_numeric_value(&audits, "largest-contentful-paint"),
            fid_ms: metric_numeric_value(&audits, "max-potential-fid"),
            cls: metric_numeric_value_f64(&audits, "cumulative-layout-shift"),
            inp_ms: metric_numeric_value(&audits, "interaction-to-next-paint"),
            opportunities: opportunities.into_iter().map(|(_, o)| o).collect(),
            tested_at: Utc::now(),
        })
    }
}

fn category_score(categories: &std::collections::HashMap<String, Category>, key: &str) -> u8 {
    categories
        .get(key)
        .and_then(|c| c.score)
        .map(|s| (s * 100.0).round() as u8)
        .unwrap_or(0)
}

fn metric_numeric_value(audits: &std::collections::HashMap<String, Audit>, key: &str) -> u32 {
    audits.get(key).and_then(|a| a.numeric_value).unwrap_or(0.0) as u32
}

fn metric_numeric_value_f64(audits: &std::collections::HashMap<String, Audit>, key: &str) -> f64 {
    audits.get(key).and_then(|a| a.numeric_value).unwrap_or(0.0)
}

#[derive(serde::Deserialize)]
struct PagespeedResponse {
    #[serde(rename = "lighthouseResult")]
    lighthouse_result: Option<LighthouseResult>,
}

#[derive(serde::Deserialize, Clone)]
struct LighthouseResult {
    categories: std::collections::HashMap<String, Category>,
    audits: std::collections::HashMap<String, Audit>,
}

#[derive(serde::Deserialize, Clone)]
struct Category {
    score: Option<f64>,
}

#[derive(serde::Deserialize, Clone)]
struct Audit {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "numericValue")]
    numeric_value: Option<f64>,
    details: Option<AuditDetails>,
}

#[derive(serde::Deserialize, Clone)]
struct AuditDetails {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "overallSavingsMs")]
    overall_savings_ms: Option<f64>,
}
