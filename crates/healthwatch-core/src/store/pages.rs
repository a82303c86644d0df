//! Page Inventory (C5) persistence operations: the canonical set of active
//! pages, synced from the CMS (§4.5).

use super::Store;
use crate::entities::Page;
use crate::error::Result;
use futures_util::stream::{self, StreamExt};

/// CMS update fan-out cap (§5 "Parallelism caps").
const UPDATE_CONCURRENCY: usize = 50;
/// CMS insert chunk size (§5).
const INSERT_CHUNK: usize = 100;

impl Store {
    /// All pages with `is_active = true`.
    pub async fn active_pages(&self) -> Result<Vec<Page>> {
        self.client
            .select("pages", &[("is_active", "true".to_string())], &[])
            .await
    }

    pub async fn page_by_url(&self, url: &str) -> Result<Option<Page>> {
        let rows: Vec<Page> = self
            .client
            .select("pages", &[("canonical_url", url.to_string())], &["limit=1"])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Insert brand-new pages in chunks of ≤100 rows per request.
    pub async fn insert_pages(&self, pages: &[Page]) -> Result<()> {
        for chunk in pages.chunks(INSERT_CHUNK) {
            let rows: Vec<serde_json::Value> =
                chunk.iter().map(|p| serde_json::to_value(p)).collect::<std::result::Result<_, _>>()?;
            self.client.insert("pages", &rows).await?;
        }
        Ok(())
    }

    /// Update existing pages with bounded concurrency (≤50 in flight).
    /// Each update is keyed by `canonical_url` (the page identity).
    pub async fn update_pages(&self, pages: &[Page]) -> Result<Vec<crate::error::HealthWatchError>> {
        let errors = stream::iter(pages.iter())
            .map(|page| async move {
                let patch = serde_json::to_value(page)?;
                self.client
                    .update("pages", &[("canonical_url", page.canonical_url.clone())], &patch)
                    .await
            })
            .buffer_unordered(UPDATE_CONCURRENCY)
            .filter_map(|r| async move { r.err() })
            .collect::<Vec<_>>()
            .await;
        Ok(errors)
    }

    /// Batch-update just the meta-issue set and derived flags (§4.8 step 8),
    /// in concurrency-bounded groups of 50.
    pub async fn update_meta_issues(&self, pages: &[Page]) -> Result<Vec<crate::error::HealthWatchError>> {
        let errors = stream::iter(pages.iter())
            .map(|page| async move {
                let patch = serde_json::json!({
                    "meta_issues": page.meta_issues,
                    "title_length": page.title_length(),
                    "meta_description_length": page.meta_description_length(),
                });
                self.client
                    .update("pages", &[("canonical_url", page.canonical_url.clone())], &patch)
                    .await
            })
            .buffer_unordered(UPDATE_CONCURRENCY)
            .filter_map(|r| async move { r.err() })
            .collect::<Vec<_>>()
            .await;
        Ok(errors)
    }

    /// Batch-persist computed score + breakdown + last_health_check_at (§4.8 step 9).
    pub async fn update_health_scores(&self, pages: &[Page]) -> Result<Vec<crate::error::HealthWatchError>> {
        let errors = stream::iter(pages.iter())
            .map(|page| async move {
                let patch = serde_json::json!({
                    "health_score": page.health_score,
                    "health_score_breakdown": page.health_score_breakdown,
                    "last_health_check_at": page.last_health_check_at,
                });
                self.client
                    .update("pages", &[("canonical_url", page.canonical_url.clone())], &patch)
                    .await
            })
            .buffer_unordered(UPDATE_CONCURRENCY)
            .filter_map(|r| async move { r.err() })
            .collect::<Vec<_>>()
            .await;
        Ok(errors)
    }

    pub async fn update_broken_link_flags(&self, pages: &[Page]) -> Result<Vec<crate::error::HealthWatchError>> {
        let errors = stream::iter(pages.iter())
            .map(|page| async move {
                let patch = serde_json::json!({
                    "has_broken_links": page.has_broken_links,
                    "broken_link_count": page.broken_link_count,
                });
                self.client
                    .update("pages", &[("canonical_url", page.canonical_url.clone())], &patch)
                    .await
            })
            .buffer_unordered(UPDATE_CONCURRENCY)
            .filter_map(|r| async move { r.err() })
            .collect::<Vec<_>>()
            .await;
        Ok(errors)
    }

    /// Flip `has_form = true` for pages the HTML form-detection supplement
    /// found a `<form` tag on (§4.5 step 6).
    pub async fn mark_pages_have_form(&self, urls: &[String]) -> Result<Vec<crate::error::HealthWatchError>> {
        let errors = stream::iter(urls.iter())
            .map(|url| async move {
                let patch = serde_json::json!({ "has_form": true });
                self.client.update("pages", &[("canonical_url", url.clone())], &patch).await
            })
            .buffer_unordered(UPDATE_CONCURRENCY)
            .filter_map(|r| async move { r.err() })
            .collect::<Vec<_>>()
            .await;
        Ok(errors)
    }
}
