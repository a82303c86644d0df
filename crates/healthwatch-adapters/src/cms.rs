//! CMS adapter (§4.2): paginated enumeration of site pages, landing pages,
//! and blog posts (100-per-page cursors), per-record detail, and form
//! enumeration with per-form submission counts. Backed by the HubSpot CMS
//! and Forms APIs (private-app token auth).

use healthwatch_core::entities::PageType;
use healthwatch_core::error::{HealthWatchError, Result};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const PAGE_SIZE: u32 = 100;
const FORM_COUNT_CONCURRENCY: usize = 5;

pub struct CmsAdapter {
    http: reqwest::Client,
    api_token: String,
}

#[derive(Debug, Clone)]
pub struct CmsPage {
    pub cms_page_id: String,
    pub canonical_url: String,
    pub slug: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub page_type: PageType,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_indexed: bool,
    pub form_ids: Vec<String>,
    pub cta_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CmsForm {
    pub form_id: String,
    pub name: String,
    pub submission_count: u64,
}

impl CmsAdapter {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_token: api_token.into(),
        }
    }

    /// The union of site pages, landing pages, and blog posts (§4.5 step 1).
    pub async fn list_all_pages(&self) -> Result<Vec<CmsPage>> {
        let mut pages = self.list_pages("pages", PageType::Site).await?;
        pages.extend(self.list_pages("landing-pages", PageType::Landing).await?);
        pages.extend(self.list_pages("blog-posts", PageType::Blog).await?);
        Ok(pages)
    }

    async fn list_pages(&self, resource: &str, page_type: PageType) -> Result<Vec<CmsPage>> {
        let mut out = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let url = format!("https://api.hubapi.com/cms/v3/{resource}");
            let mut req = self
                .http
                .get(&url)
                .bearer_auth(&self.api_token)
                .query(&[("limit", PAGE_SIZE.to_string())]);
            if let Some(cursor) = &after {
                req = req.query(&[("after", cursor.as_str())]);
            }
            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(HealthWatchError::Remote(format!(
                    "CMS listing '{resource}' failed with status {}",
                    resp.status()
                )));
            }
            let body: CmsListResponse = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;
            out.extend(body.results.into_iter().map(|r| r.into_cms_page(page_type)));
            after = body.paging.and_then(|p| p.next).map(|n| n.after);
            if after.is_none() {
                break;
            }
        }
        Ok(out)
    }

    pub async fn page_detail(&self, resource: &str, cms_page_id: &str) -> Result<CmsPage> {
        let url = format!("https://api.hubapi.com/cms/v3/{resource}/{cms_page_id}");
        let resp = self.http.get(&url).bearer_auth(&self.api_token).send().await?;
        if !resp.status().is_success() {
            return Err(HealthWatchError::Remote(format!(
                "CMS page detail for '{cms_page_id}' failed with status {}",
                resp.status()
            )));
        }
        let raw: CmsPageRaw = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;
        Ok(raw.into_cms_page(PageType::Site))
    }

    /// All forms with their submission counts, resolved with a concurrency
    /// cap of 5 per §4.2.
    pub async fn forms_with_submission_counts(&self) -> Result<Vec<CmsForm>> {
        let url = "https://api.hubapi.com/marketing/v3/forms";
        let resp = self.http.get(url).bearer_auth(&self.api_token).send().await?;
        if !resp.status().is_success() {
            return Err(HealthWatchError::Remote(format!(
                "forms listing failed with status {}",
                resp.status()
            )));
        }
        let body: FormsListResponse = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;

        let semaphore = Arc::new(Semaphore::new(FORM_COUNT_CONCURRENCY));
        let mut handles = Vec::new();
        for form in body.results {
            let permit_src = Arc::clone(&semaphore);
            let http = self.http.clone();
            let token = self.api_token.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit_src.acquire_owned().await.ok();
                let count = fetch_submission_count(&http, &token, &form.id).await.unwrap_or(0);
                CmsForm { form_id: form.id, name: form.name, submission_count: count }
            }));
        }
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            if let Ok(form) = h.await {
                out.push(form);
            }
        }
        Ok(out)
    }
}

async fn fetch_submission_count(http: &reqwest::Client, token: &str, form_id: &str) -> Result<u64> {
    let url = format!("https://api.hubapi.com/form-integrations/v1/submissions/forms/{form_id}");
    let resp = http
        .get(&url)
        .bearer_auth(token)
        .query(&[("limit", "1")])
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(HealthWatchError::Remote(format!(
            "submission count for form '{form_id}' failed with status {}",
            resp.status()
        )));
    }
    let body: SubmissionsResponse = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;
    Ok(body.total.unwrap_or(0))
}

/// Matches `<form[\s>]` against a raw widget payload blob; used to
/// supplement structured form ids when HubSpot's widget metadata omits them.
pub fn extract_form_ids_from_widgets(widget_json: &serde_json::Value) -> Vec<String> {
    let re = Regex::new(r#""formId"\s*:\s*"([a-zA-Z0-9-]+)""#).expect("valid regex");
    re.captures_iter(&widget_json.to_string())
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[derive(serde::Deserialize)]
struct CmsListResponse {
    results: Vec<CmsPageRaw>,
    paging: Option<Paging>,
}

#[derive(serde::Deserialize)]
struct Paging {
    next: Option<PagingNext>,
}

#[derive(serde::Deserialize)]
struct PagingNext {
    after: String,
}

#[derive(serde::Deserialize)]
struct CmsPageRaw {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(rename = "htmlTitle", default)]
    html_title: Option<String>,
    #[serde(rename = "metaDescription", default)]
    meta_description: Option<String>,
    #[serde(default)]
    published: Option<bool>,
    #[serde(rename = "publishDate", default)]
    publish_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "updated", default)]
    updated: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "widgets", default)]
    widgets: Option<serde_json::Value>,
}

impl CmsPageRaw {
    fn into_cms_page(self, page_type: PageType) -> CmsPage {
        let form_ids = self.widgets.as_ref().map(extract_form_ids_from_widgets).unwrap_or_default();
        CmsPage {
            cms_page_id: self.id,
            canonical_url: self.url.unwrap_or_default(),
            slug: self.slug.unwrap_or_default(),
            title: self.html_title,
            meta_description: self.meta_description,
            page_type,
            published_at: self.publish_date,
            last_updated_at: self.updated,
            is_indexed: self.published.unwrap_or(true),
            form_ids,
            cta_ids: vec![],
        }
    }
}

#[derive(serde::Deserialize)]
struct FormsListResponse {
    results: Vec<FormSummary>,
}

#[derive(serde::Deserialize)]
struct FormSummary {
    id: String,
    name: String,
}

#[derive(serde::Deserialize)]
struct SubmissionsResponse {
    total: Option<u64>,
}
