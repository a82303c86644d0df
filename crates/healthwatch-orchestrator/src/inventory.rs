//! Page Inventory reconciliation (C5, §4.5): CMS sync plus the HTML
//! form-detection supplement.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use healthwatch_adapters::cms::{CmsAdapter, CmsPage};
use healthwatch_adapters::link_checker::LinkChecker;
use healthwatch_core::entities::Page;
use healthwatch_core::error::Result;
use healthwatch_core::store::Store;
use std::collections::HashMap;

const FORM_DETECTION_CONCURRENCY: usize = 20;

pub struct ReconcileOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub form_detected: usize,
}

/// Steps 1–5 of §4.5: union the CMS page types, diff against the active
/// inventory, commit inserts/updates, then reload. `link_checker` supplies
/// step 6's live form-detection fetch.
pub async fn sync_from_cms(store: &Store, cms: &CmsAdapter, link_checker: &LinkChecker) -> Result<ReconcileOutcome> {
    let cms_pages = cms.list_all_pages().await?;
    let existing = store.active_pages().await?;
    let mut existing_by_url: HashMap<String, Page> =
        existing.into_iter().map(|p| (p.canonical_url.clone(), p)).collect();

    let mut to_insert = Vec::new();
    let mut to_update = Vec::new();
    for cms_page in cms_pages {
        let content_age_days = cms_page
            .last_updated_at
            .map(|t| (Utc::now() - t).num_days().max(0));
        if let Some(existing_page) = existing_by_url.remove(&cms_page.canonical_url) {
            to_update.push(merge_into_page(existing_page, &cms_page, content_age_days));
        } else {
            to_insert.push(new_page_from_cms(&cms_page, content_age_days));
        }
    }

    let inserted = to_insert.len();
    let updated = to_update.len();
    if !to_insert.is_empty() {
        store.insert_pages(&to_insert).await?;
    }
    if !to_update.is_empty() {
        for err in store.update_pages(&to_update).await? {
            tracing::warn!(error = %err, "page update failed during CMS sync");
        }
    }

    let form_detected = form_detection_supplement(store, link_checker).await?;

    Ok(ReconcileOutcome { inserted, updated, form_detected })
}

/// Step 6 of §4.5: landing pages without a detected form get a live fetch.
async fn form_detection_supplement(store: &Store, link_checker: &LinkChecker) -> Result<usize> {
    use healthwatch_core::entities::PageType;

    let candidates: Vec<Page> = store
        .active_pages()
        .await?
        .into_iter()
        .filter(|p| p.page_type == PageType::Landing && !p.has_form)
        .collect();

    let results: Vec<(String, bool)> = stream::iter(candidates.into_iter().map(|page| async move {
        let detected = link_checker.detect_html_form(&page.canonical_url).await.unwrap_or(false);
        (page.canonical_url, detected)
    }))
    .buffer_unordered(FORM_DETECTION_CONCURRENCY)
    .collect()
    .await;

    let detected_urls: Vec<String> = results.into_iter().filter(|(_, d)| *d).map(|(u, _)| u).collect();
    let count = detected_urls.len();
    if !detected_urls.is_empty() {
        for err in store.mark_pages_have_form(&detected_urls).await? {
            tracing::warn!(error = %err, "form-flag update failed");
        }
    }
    Ok(count)
}

fn new_page_from_cms(cms_page: &CmsPage, content_age_days: Option<i64>) -> Page {
    Page {
        canonical_url: cms_page.canonical_url.clone(),
        slug: cms_page.slug.clone(),
        title: cms_page.title.clone(),
        meta_description: cms_page.meta_description.clone(),
        page_type: cms_page.page_type,
        cms_page_id: Some(cms_page.cms_page_id.clone()),
        has_form: !cms_page.form_ids.is_empty(),
        form_ids: cms_page.form_ids.clone(),
        has_cta: !cms_page.cta_ids.is_empty(),
        cta_ids: cms_page.cta_ids.clone(),
        published_at: cms_page.published_at,
        last_updated_at: cms_page.last_updated_at,
        content_age_days,
        is_indexed: cms_page.is_indexed,
        is_active: true,
        meta_issues: Default::default(),
        has_broken_links: false,
        broken_link_count: 0,
        health_score: None,
        health_score_breakdown: None,
        last_health_check_at: None,
    }
}

fn merge_into_page(mut existing: Page, cms_page: &CmsPage, content_age_days: Option<i64>) -> Page {
    existing.slug = cms_page.slug.clone();
    existing.title = cms_page.title.clone();
    existing.meta_description = cms_page.meta_description.clone();
    existing.page_type = cms_page.page_type;
    existing.cms_page_id = Some(cms_page.cms_page_id.clone());
    if !cms_page.form_ids.is_empty() {
        existing.has_form = true;
        existing.form_ids = cms_page.form_ids.clone();
    }
    if !cms_page.cta_ids.is_empty() {
        existing.has_cta = true;
        existing.cta_ids = cms_page.cta_ids.clone();
    }
    existing.published_at = cms_page.published_at;
    existing.last_updated_at = cms_page.last_updated_at;
    existing.content_age_days = content_age_days;
    existing.is_indexed = cms_page.is_indexed;
    existing
}
