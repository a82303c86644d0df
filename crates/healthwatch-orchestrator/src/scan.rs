//! Scan Orchestrator (C8, §4.8): the scheduled twelve-step pipeline. Runs
//! against a global deadline, recording per-step error strings rather than
//! aborting — only a failed token refresh or config error stops the run.

use crate::{inventory, writer};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use healthwatch_adapters::analytics::AnalyticsAdapter;
use healthwatch_adapters::cms::CmsAdapter;
use healthwatch_adapters::link_checker::LinkChecker;
use healthwatch_adapters::performance::PerformanceAdapter;
use healthwatch_adapters::search_index::SearchIndexAdapter;
use healthwatch_core::entities::{
    AnalyticsSnapshot, ChangeLogEntry, ChangeLogOutcome, Page, PageType, SearchSnapshot, SpeedScore, SpeedStrategy,
};
use healthwatch_core::error::Result;
use healthwatch_core::signal_bus::SignalBus;
use healthwatch_core::store::Store;
use healthwatch_core::Config;
use healthwatch_scoring::{audit, score, ScoringInputs};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Number of spot-checked speed tests per scan (§4.8 step 5).
const SPEED_SPOT_CHECKS: usize = 2;
/// Number of URLs checked for broken links per scan (§4.8 step 7).
const LINK_CHECK_BATCH: usize = 15;
const LINK_CHECK_CONCURRENCY: usize = 5;

pub struct ScanOrchestrator {
    pub store: Store,
    pub analytics: AnalyticsAdapter,
    pub search_index: Arc<SearchIndexAdapter>,
    pub performance: PerformanceAdapter,
    pub cms: CmsAdapter,
    pub link_checker: LinkChecker,
    pub agent_llm_api_key: String,
    pub agent_llm_model: String,
    pub config: Config,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub step_errors: Vec<String>,
    pub pages_scored: usize,
    pub pages_flagged: usize,
    pub findings_submitted: usize,
    pub findings_skipped: usize,
}

impl ScanOrchestrator {
    pub async fn run(&self) -> Result<ScanReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("scan_run", run_id = %run_id).entered();
        let bus = SignalBus::new(self.store.clone());
        let mut report = ScanReport::default();

        let today = Utc::now().date_naive();
        let current_window = (today - chrono::Duration::days(7), today);
        let previous_window = (today - chrono::Duration::days(14), today - chrono::Duration::days(7));

        // Steps 3-4: search + analytics snapshots, upserted by natural key.
        let cancel = CancellationToken::new();
        match self.search_index.page_metrics_with_comparison(current_window, previous_window, &cancel).await {
            Ok(rows) => {
                if let Err(e) = self.store.upsert_search_snapshots(&rows).await {
                    report.step_errors.push(format!("search upsert: {e}"));
                }
            }
            Err(e) => report.step_errors.push(format!("search fetch: {e}")),
        }
        match self.analytics.page_metrics_with_comparison(current_window, previous_window, &cancel).await {
            Ok(rows) => {
                if let Err(e) = self.store.upsert_analytics_snapshots(&rows).await {
                    report.step_errors.push(format!("analytics upsert: {e}"));
                }
            }
            Err(e) => report.step_errors.push(format!("analytics fetch: {e}")),
        }

        // Step 5: speed spot checks, bounded by a 50s soft deadline.
        if let Err(e) = self.speed_spot_checks(started, &mut report).await {
            report.step_errors.push(format!("speed spot checks: {e}"));
        }

        // Step 6: CMS sync + form-detection supplement, then reload inventory.
        match inventory::sync_from_cms(&self.store, &self.cms, &self.link_checker).await {
            Ok(outcome) => tracing::info!(
                inserted = outcome.inserted,
                updated = outcome.updated,
                form_detected = outcome.form_detected,
                "CMS sync complete"
            ),
            Err(e) => report.step_errors.push(format!("cms sync: {e}")),
        }

        // Step 7: broken-link check over a priority-ordered URL batch.
        if let Err(e) = self.broken_link_check(&mut report).await {
            report.step_errors.push(format!("link check: {e}"));
        }

        let mut pages = self.store.active_pages().await?;

        // Step 8: meta audit.
        let issues_by_url = audit(&pages);
        for page in pages.iter_mut() {
            page.meta_issues = issues_by_url.get(&page.canonical_url).cloned().unwrap_or_default();
        }
        for err in self.store.update_meta_issues(&pages).await? {
            report.step_errors.push(format!("meta update: {err}"));
        }

        // Step 9: score every page against the latest matching snapshots.
        let analytics_by_path = self.latest_analytics_by_path(&pages).await;
        let search_by_url = self.latest_search_by_url(&pages).await;
        let speed_by_url = self.store.all_latest_speed_scores().await?.into_iter().fold(
            HashMap::new(),
            |mut map: HashMap<String, SpeedScore>, s| {
                map.entry(s.page_url.clone()).or_insert(s);
                map
            },
        );

        for page in pages.iter_mut() {
            let (path, _) = page.path_for_analytics_join();
            let inputs = ScoringInputs {
                page,
                analytics: analytics_by_path.get(&path),
                search: search_by_url.get(&normalize_url(&page.canonical_url)),
                speed: speed_by_url.get(&page.canonical_url),
                now_utc_date: today,
            };
            let breakdown = score(&inputs);
            page.health_score = Some(breakdown.total());
            page.health_score_breakdown = Some(breakdown);
            page.last_health_check_at = Some(Utc::now());
        }
        for err in self.store.update_health_scores(&pages).await? {
            report.step_errors.push(format!("score update: {err}"));
        }
        report.pages_scored = pages.len();

        // Step 10: flag and rank.
        let mut flagged: Vec<&Page> = pages
            .iter()
            .filter(|p| p.health_score_breakdown.map(|b| b.is_flagged()).unwrap_or(false))
            .collect();
        flagged.sort_by_key(|p| p.health_score.unwrap_or(0));
        report.pages_flagged = flagged.len();

        // Step 11: agent loop, only while elapsed < 80s at entry.
        if started.elapsed() < Duration::from_secs(self.config.agent_loop_cutoff_secs) {
            let take = self.config.flagged_pages_per_scan.min(flagged.len());
            for page in flagged.into_iter().take(take) {
                self.investigate_one(page, &mut report).await;
            }
        } else {
            tracing::warn!("skipping agent loop: elapsed exceeded agent_loop_cutoff_secs");
        }

        // Step 12: audit log + completion signal.
        let log_entry = ChangeLogEntry {
            id: Uuid::new_v4(),
            action: "health_scan".to_string(),
            outcome: ChangeLogOutcome::Executed,
            executed_at: Some(Utc::now()),
            executed_by: Some("scan_orchestrator".to_string()),
            details: serde_json::json!({
                "run_id": run_id,
                "pages_scored": report.pages_scored,
                "pages_flagged": report.pages_flagged,
                "findings_submitted": report.findings_submitted,
                "findings_skipped": report.findings_skipped,
                "step_errors": report.step_errors,
            }),
            created_at: Utc::now(),
        };
        self.store.append_change_log(&log_entry).await?;
        bus.emit(
            "health_scan_complete",
            serde_json::json!({
                "pages_scored": report.pages_scored,
                "pages_flagged": report.pages_flagged,
                "duration_ms": started.elapsed().as_millis(),
            }),
        )
        .await;

        Ok(report)
    }

    async fn speed_spot_checks(&self, started: Instant, report: &mut ScanReport) -> Result<()> {
        let pages = self.store.active_pages().await?;
        let candidates = prioritize_speed_candidates(&pages, SPEED_SPOT_CHECKS);
        for page in candidates {
            if started.elapsed() > Duration::from_secs(self.config.speed_check_cutoff_secs) {
                break;
            }
            match self.performance.run_audit(&page.canonical_url, SpeedStrategy::Mobile).await {
                Ok(result) => {
                    if let Err(e) = self.store.insert_speed_scores(std::slice::from_ref(&result)).await {
                        report.step_errors.push(format!("speed persist: {e}"));
                    }
                }
                Err(e) => report.step_errors.push(format!("speed audit {}: {e}", page.canonical_url)),
            }
        }
        Ok(())
    }

    async fn broken_link_check(&self, report: &mut ScanReport) -> Result<()> {
        let sitemap_urls = self.link_checker.fetch_sitemap_urls().await.unwrap_or_default();
        let pages = self.store.active_pages().await?;
        let previously_broken = self.previously_broken_urls().await.unwrap_or_default();
        let batch = prioritize_link_check_batch(&pages, &sitemap_urls, &previously_broken, LINK_CHECK_BATCH);

        let records: Vec<_> = stream::iter(batch.into_iter().map(|(source, target)| async move {
            self.link_checker.check_link(&source, &target).await
        }))
        .buffer_unordered(LINK_CHECK_CONCURRENCY)
        .collect()
        .await;

        if !records.is_empty() {
            self.store.upsert_link_health(&records).await?;
        }
        Ok(())
    }

    async fn previously_broken_urls(&self) -> Result<Vec<String>> {
        let pages = self.store.active_pages().await?;
        let mut urls = Vec::new();
        for page in &pages {
            let broken = self.store.broken_links_for_page(&page.canonical_url).await?;
            urls.extend(broken.into_iter().map(|b| b.target_url));
        }
        Ok(urls)
    }

    async fn latest_analytics_by_path(&self, pages: &[Page]) -> HashMap<String, AnalyticsSnapshot> {
        let mut map = HashMap::new();
        for page in pages {
            let (path, _) = page.path_for_analytics_join();
            if map.contains_key(&path) {
                continue;
            }
            if let Ok(rows) = self.store.latest_analytics(&path, 1).await {
                if let Some(row) = rows.into_iter().next() {
                    map.insert(path, row);
                }
            }
        }
        map
    }

    async fn latest_search_by_url(&self, pages: &[Page]) -> HashMap<String, SearchSnapshot> {
        let mut map = HashMap::new();
        for page in pages {
            let key = normalize_url(&page.canonical_url);
            if map.contains_key(&key) {
                continue;
            }
            if let Ok(rows) = self.store.latest_search(&page.canonical_url, 1).await {
                if let Some(row) = rows.into_iter().next() {
                    map.insert(key, row);
                }
            }
        }
        map
    }

    async fn investigate_one(&self, page: &Page, report: &mut ScanReport) {
        let llm = healthwatch_agent::LlmClient::new(self.agent_llm_api_key.clone(), self.agent_llm_model.clone());
        let loop_runner =
            healthwatch_agent::AgentLoop::new(llm, self.store.clone(), Some(Arc::clone(&self.search_index)));

        let analytics_summary = self
            .store
            .latest_analytics(&page.path_for_analytics_join().0, 3)
            .await
            .map(|rows| serde_json::to_value(rows).unwrap_or_default())
            .unwrap_or(serde_json::Value::Null);
        let search_summary = self
            .store
            .latest_search(&page.canonical_url, 3)
            .await
            .map(|rows| serde_json::to_value(rows).unwrap_or_default())
            .unwrap_or(serde_json::Value::Null);
        let speed_summary = self
            .store
            .latest_speed_score(&page.canonical_url)
            .await
            .map(|s| serde_json::to_value(s).unwrap_or_default())
            .unwrap_or(serde_json::Value::Null);

        let flagged = healthwatch_agent::FlaggedPageContext {
            page: page.clone(),
            flag_reasons: flag_reasons(page),
            analytics_summary,
            search_summary,
            speed_summary,
        };

        match loop_runner.investigate(flagged).await {
            Ok(healthwatch_agent::AgentLoopOutcome::Submitted { finding, decision }) => {
                report.findings_submitted += 1;
                if let Err(e) = writer::record_submission(&self.store, &finding, &decision).await {
                    report.step_errors.push(format!("writer: {e}"));
                }
            }
            Ok(healthwatch_agent::AgentLoopOutcome::Skipped { .. }) => {
                report.findings_skipped += 1;
            }
            Ok(healthwatch_agent::AgentLoopOutcome::Deduped { existing_finding_id }) => {
                tracing::info!(finding_id = %existing_finding_id, page_url = %page.canonical_url, "investigation deduped");
            }
            Err(e) => report.step_errors.push(format!("agent loop {}: {e}", page.canonical_url)),
        }
    }
}

fn flag_reasons(page: &Page) -> Vec<String> {
    let mut reasons = Vec::new();
    if let Some(breakdown) = page.health_score_breakdown {
        if breakdown.is_critical() {
            reasons.push("critical health score".to_string());
        } else if breakdown.is_flagged() {
            reasons.push("flagged health score".to_string());
        }
        if breakdown.traffic_trend <= 8 {
            reasons.push("traffic decline".to_string());
        }
        if breakdown.seo_ranking <= 8 {
            reasons.push("ranking loss".to_string());
        }
        if breakdown.page_speed <= 8 {
            reasons.push("slow page speed".to_string());
        }
    }
    if page.has_broken_links {
        reasons.push("broken links present".to_string());
    }
    reasons
}

/// never-tested first, then lowest-scored, then landing pages, then any —
/// deduped by URL, truncated to `limit` (§4.8 step 5).
fn prioritize_speed_candidates(pages: &[Page], limit: usize) -> Vec<Page> {
    let mut never_tested: Vec<&Page> = pages.iter().filter(|p| p.last_health_check_at.is_none()).collect();
    never_tested.sort_by_key(|p| p.canonical_url.clone());

    let mut lowest_scored: Vec<&Page> = pages.iter().collect();
    lowest_scored.sort_by_key(|p| p.health_score.unwrap_or(0));

    let landing: Vec<&Page> = pages.iter().filter(|p| p.page_type == PageType::Landing).collect();

    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for candidate in never_tested.into_iter().chain(lowest_scored).chain(landing).chain(pages.iter()) {
        if result.len() >= limit {
            break;
        }
        if seen.insert(candidate.canonical_url.clone()) {
            result.push(candidate.clone());
        }
    }
    result
}

/// previously-broken targets first, then landing pages' own URLs, then
/// sitemap URLs — deduped, truncated to `limit` (§4.8 step 7). Each entry is
/// `(source_page_url, target_url)`; previously-broken/sitemap entries use the
/// base site itself as the notional source.
fn prioritize_link_check_batch(
    pages: &[Page],
    sitemap_urls: &[String],
    previously_broken: &[String],
    limit: usize,
) -> Vec<(String, String)> {
    let site_root = pages.first().map(|p| p.canonical_url.clone()).unwrap_or_default();
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();

    for target in previously_broken {
        if result.len() >= limit {
            break;
        }
        if seen.insert(target.clone()) {
            result.push((site_root.clone(), target.clone()));
        }
    }
    for page in pages.iter().filter(|p| p.page_type == PageType::Landing) {
        if result.len() >= limit {
            break;
        }
        if seen.insert(page.canonical_url.clone()) {
            result.push((site_root.clone(), page.canonical_url.clone()));
        }
    }
    for url in sitemap_urls {
        if result.len() >= limit {
            break;
        }
        if seen.insert(url.clone()) {
            result.push((site_root.clone(), url.clone()));
        }
    }
    result
}

fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
