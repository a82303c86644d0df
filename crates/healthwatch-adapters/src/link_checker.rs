//! Link checker adapter (§4.2): best-effort sitemap parsing, bounded-redirect
//! HEAD probes, and an HTML form-detection helper that supplements the CMS
//! widget parser (§4.5 step 6).

use healthwatch_core::entities::{LinkHealthRecord, LinkType};
use healthwatch_core::error::{HealthWatchError, Result};
use regex::Regex;
use std::time::Duration;
use url::Url;

const MAX_REDIRECTS: usize = 5;
const LINK_CHECK_TIMEOUT_SECS: u64 = 10;
const HTML_FETCH_TIMEOUT_SECS: u64 = 5;
const USER_AGENT: &str = "healthwatch-link-checker/1.0";

pub struct LinkChecker {
    http: reqwest::Client,
    /// Separate client for the HTML form-detection GET (§4.5 step 6), which
    /// wants automatic redirect-following rather than the manual chain-walk
    /// used by `check_link`.
    html_fetch_http: reqwest::Client,
    base_site_origin: String,
}

impl LinkChecker {
    pub fn new(base_site_origin: impl Into<String>) -> Self {
        Self {
            // Disable reqwest's automatic redirect-following: we walk the
            // chain manually so we can cap it at 5 and record each hop.
            http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            html_fetch_http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_site_origin: base_site_origin.into(),
        }
    }

    /// Best-effort `<loc>` extraction; returns an empty list rather than an
    /// error on a malformed sitemap (§7 DataError policy).
    pub async fn fetch_sitemap_urls(&self) -> Result<Vec<String>> {
        let url = format!("{}/sitemap.xml", self.base_site_origin.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(LINK_CHECK_TIMEOUT_SECS))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(vec![]);
        }
        let body = resp.text().await.unwrap_or_default();
        let re = match Regex::new(r"<loc>\s*([^<\s]+)\s*</loc>") {
            Ok(r) => r,
            Err(_) => return Ok(vec![]),
        };
        Ok(re.captures_iter(&body).filter_map(|c| c.get(1).map(|m| m.as_str().to_string())).collect())
    }

    /// A manual-redirect HEAD probe, following at most 5 hops (§8 property 12).
    pub async fn check_link(&self, source_page_url: &str, target_url: &str) -> LinkHealthRecord {
        let now = chrono::Utc::now();
        let link_type = self.classify_link(target_url);
        let mut chain = Vec::new();
        let mut current = target_url.to_string();
        let mut final_status: Option<u16> = None;
        let mut error_message = None;

        for _ in 0..=MAX_REDIRECTS {
            let resp = self
                .http
                .head(&current)
                .timeout(Duration::from_secs(LINK_CHECK_TIMEOUT_SECS))
                .send()
                .await;
            match resp {
                Ok(r) => {
                    let status = r.status();
                    if status.is_redirection() {
                        if let Some(loc) = r.headers().get(reqwest::header::LOCATION).and_then(|h| h.to_str().ok()) {
                            chain.push(loc.to_string());
                            current = resolve(&current, loc);
                            continue;
                        }
                    }
                    final_status = Some(status.as_u16());
                    break;
                }
                Err(e) => {
                    error_message = Some(e.to_string());
                    break;
                }
            }
        }

        let is_broken = error_message.is_some() || LinkHealthRecord::compute_is_broken(final_status);
        let redirect_count = chain.len() as u32;
        LinkHealthRecord {
            source_page_url: source_page_url.to_string(),
            target_url: target_url.to_string(),
            link_type,
            http_status: final_status,
            is_broken,
            is_redirect: redirect_count > 1,
            redirect_chain: chain,
            redirect_count,
            error_message,
            first_detected_at: now,
            last_checked_at: now,
            is_resolved: false,
            resolved_at: None,
        }
    }

    fn classify_link(&self, target_url: &str) -> LinkType {
        match Url::parse(target_url) {
            Ok(u) if u.origin().ascii_serialization() == self.base_site_origin => LinkType::Internal,
            Ok(_) => LinkType::External,
            Err(_) => LinkType::Internal,
        }
    }

    /// Supplements the CMS widget parser: fetches the live page and matches
    /// `<form[\s>]` in the body (§4.5 step 6).
    pub async fn detect_html_form(&self, page_url: &str) -> Result<bool> {
        let resp = self
            .html_fetch_http
            .get(page_url)
            .timeout(Duration::from_secs(HTML_FETCH_TIMEOUT_SECS))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body = resp.text().await.unwrap_or_default();
        let re = Regex::new(r"<form[\s>]").expect("valid regex");
        Ok(re.is_match(&body))
    }
}

fn resolve(base: &str, location: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}
