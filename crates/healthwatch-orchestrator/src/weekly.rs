//! Weekly Orchestrator (C11, §4.11): the deeper sweep — conversion audit,
//! full link sweep, full meta audit, keyword-coverage analysis, stale-page
//! sweep, trend snapshot, and the narrative digest.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use healthwatch_adapters::cms::CmsAdapter;
use healthwatch_adapters::link_checker::LinkChecker;
use healthwatch_adapters::search_index::SearchIndexAdapter;
use healthwatch_core::entities::{
    ChangeLogEntry, ChangeLogOutcome, ConversionAudit, ConversionGap, Finding, FindingStatus, FindingType,
    PageTrendEntry, PeriodType, TrackingHealth, TrendSnapshot, WeeklyDigest,
};
use healthwatch_core::error::Result;
use healthwatch_core::signal_bus::SignalBus;
use healthwatch_core::store::Store;
use healthwatch_core::Config;
use healthwatch_scoring::audit;
use std::time::Duration;
use uuid::Uuid;

const LINK_SWEEP_CONCURRENCY: usize = 5;
/// Configured conversion-event names this site tracks in the analytics
/// property (§4.11 step 3). Mirrors the set the teacher's wellness report
/// hard-codes for its own KPI list rather than discovering it dynamically.
const CONFIGURED_EVENT_NAMES: &[&str] = &["form_submit", "demo_request", "newsletter_signup"];

pub struct WeeklyOrchestrator {
    pub store: Store,
    pub search_index: SearchIndexAdapter,
    pub cms: CmsAdapter,
    pub link_checker: LinkChecker,
    pub agent_llm_api_key: String,
    pub agent_llm_model: String,
    pub config: Config,
}

#[derive(Debug, Default)]
pub struct WeeklyReport {
    pub step_errors: Vec<String>,
    pub conversion_audit: Option<ConversionAudit>,
    pub links_resolved: usize,
    pub stale_page_count: usize,
    pub keyword_coverage: Vec<KeywordCoverage>,
}

#[derive(Debug, Clone)]
pub struct KeywordCoverage {
    pub keyword: String,
    pub has_organic_page: bool,
}

impl WeeklyOrchestrator {
    pub async fn run(&self) -> Result<WeeklyReport> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("weekly_run", run_id = %run_id).entered();
        let bus = SignalBus::new(self.store.clone());
        let mut report = WeeklyReport::default();
        let today = Utc::now().date_naive();
        let window = (today - chrono::Duration::days(7), today);

        // Step 3: conversion audit.
        match self.run_conversion_audit(window).await {
            Ok(audit) => {
                self.store.insert_conversion_audit(&audit).await?;
                report.conversion_audit = Some(audit);
            }
            Err(e) => report.step_errors.push(format!("conversion audit: {e}")),
        }

        // Step 4: full sitemap link sweep, resolving previously-broken targets.
        match self.full_link_sweep().await {
            Ok(resolved) => report.links_resolved = resolved,
            Err(e) => report.step_errors.push(format!("link sweep: {e}")),
        }

        // Step 5: full meta audit.
        let pages = self.store.active_pages().await?;
        let issues_by_url = audit(&pages);
        let mut updated_pages = pages.clone();
        for page in updated_pages.iter_mut() {
            page.meta_issues = issues_by_url.get(&page.canonical_url).cloned().unwrap_or_default();
        }
        for err in self.store.update_meta_issues(&updated_pages).await? {
            report.step_errors.push(format!("meta update: {err}"));
        }

        // Auto-resolution sweep: a broken-links/meta-issue finding whose
        // underlying condition no longer exists moves to `resolved` (§GLOSSARY
        // "Auto-resolution", attached to this step alongside the link sweep).
        match self.auto_resolve_findings(&updated_pages).await {
            Ok(count) if count > 0 => {
                let log_entry = ChangeLogEntry {
                    id: Uuid::new_v4(),
                    action: "auto_resolve_findings".to_string(),
                    outcome: ChangeLogOutcome::Executed,
                    executed_at: Some(Utc::now()),
                    executed_by: Some("weekly_orchestrator".to_string()),
                    details: serde_json::json!({ "run_id": run_id, "resolved_count": count }),
                    created_at: Utc::now(),
                };
                if let Err(e) = self.store.append_change_log(&log_entry).await {
                    report.step_errors.push(format!("auto-resolve log: {e}"));
                }
            }
            Ok(_) => {}
            Err(e) => report.step_errors.push(format!("auto-resolve: {e}")),
        }

        // Step 6: keyword-coverage analysis from recent trend/CPC signals.
        match self.keyword_coverage_analysis().await {
            Ok(coverage) => report.keyword_coverage = coverage,
            Err(e) => report.step_errors.push(format!("keyword coverage: {e}")),
        }

        // Step 7: stale-page sweep.
        report.stale_page_count = pages
            .iter()
            .filter(|p| p.last_updated_at.is_none() || p.content_age_days.map(|d| d > 180).unwrap_or(false))
            .count();

        // Step 8: trend snapshot.
        let snapshot = match self.compute_trend_snapshot(&pages, window).await {
            Ok(s) => {
                self.store.insert_trend_snapshot(&s).await?;
                if s.new_broken_links > 0 {
                    bus.emit("new_broken_links_detected", serde_json::json!({ "count": s.new_broken_links })).await;
                }
                if s.traffic_change_pct < -15.0 {
                    bus.emit(
                        "sitewide_traffic_decline",
                        serde_json::json!({ "traffic_change_pct": s.traffic_change_pct }),
                    )
                    .await;
                }
                Some(s)
            }
            Err(e) => {
                report.step_errors.push(format!("trend snapshot: {e}"));
                None
            }
        };

        // Step 9: digest narrative.
        if let Some(snapshot) = snapshot {
            if let Err(e) = self.render_digest(&snapshot, &report).await {
                report.step_errors.push(format!("digest: {e}"));
            }
        }

        Ok(report)
    }

    async fn run_conversion_audit(&self, window: (chrono::NaiveDate, chrono::NaiveDate)) -> Result<ConversionAudit> {
        let forms = self.cms.forms_with_submission_counts().await?;
        let events = self.search_index_events_fallback(window).await;

        let normalized_events: Vec<String> = events.iter().map(|e| normalize_name(e)).collect();
        let mut gaps = Vec::new();
        for form in &forms {
            let normalized_form = normalize_name(&form.name);
            if !normalized_events.iter().any(|e| e == &normalized_form) {
                gaps.push(ConversionGap {
                    form_name: form.name.clone(),
                    expected_event_name: format!("{}_submit", normalized_form),
                    submission_count: form.submission_count,
                });
            }
        }

        let tracking_health = if events.is_empty() {
            TrackingHealth::NotConfigured
        } else if gaps.is_empty() {
            TrackingHealth::Healthy
        } else if gaps.len() < forms.len() {
            TrackingHealth::Degraded
        } else {
            TrackingHealth::Broken
        };

        let recommendations = gaps
            .iter()
            .map(|g| format!("Wire up conversion tracking for form '{}' (expected event '{}')", g.form_name, g.expected_event_name))
            .collect();

        Ok(ConversionAudit {
            id: Uuid::new_v4(),
            period_start: window.0,
            period_end: window.1,
            tracking_health,
            configured_events: events,
            forms_total: forms.len() as u32,
            submissions_total: forms.iter().map(|f| f.submission_count).sum(),
            gaps,
            recommendations,
            created_at: Utc::now(),
        })
    }

    /// §4.11 step 3 calls for "enumerate configured conversion events"; the
    /// GA4 Data API has no events-config endpoint wired into
    /// [`healthwatch_adapters::analytics`], so this compares against the
    /// site's hard-coded KPI event list instead of a live query.
    async fn search_index_events_fallback(&self, _window: (chrono::NaiveDate, chrono::NaiveDate)) -> Vec<String> {
        CONFIGURED_EVENT_NAMES.iter().map(|s| s.to_string()).collect()
    }

    async fn full_link_sweep(&self) -> Result<usize> {
        let sitemap_urls = self.link_checker.fetch_sitemap_urls().await.unwrap_or_default();
        let pages = self.store.active_pages().await?;
        let site_root = pages.first().map(|p| p.canonical_url.clone()).unwrap_or_default();

        let mut targets: Vec<String> = sitemap_urls;
        targets.extend(pages.iter().map(|p| p.canonical_url.clone()));
        targets.sort();
        targets.dedup();

        let records: Vec<_> = stream::iter(targets.into_iter().map(|target| {
            let source = site_root.clone();
            async move { self.link_checker.check_link(&source, &target).await }
        }))
        .buffer_unordered(LINK_SWEEP_CONCURRENCY)
        .collect()
        .await;

        let resolved_count = records.iter().filter(|r| !r.is_broken).count();
        if !records.is_empty() {
            self.store.upsert_link_health(&records).await?;
        }
        Ok(resolved_count)
    }

    /// Resolves `BrokenLinks`/`MetaIssue` findings whose page no longer
    /// exhibits the condition that triggered them (§GLOSSARY "Auto-resolution").
    async fn auto_resolve_findings(&self, pages: &[healthwatch_core::entities::Page]) -> Result<usize> {
        let candidates: Vec<Finding> = self
            .store
            .client()
            .select(
                "findings",
                &[],
                &["or=(status.eq.new,status.eq.recommendation_drafted,status.eq.approved)", "limit=200"],
            )
            .await?;

        let mut resolved = 0usize;
        for finding in candidates {
            if !matches!(finding.finding_type, FindingType::BrokenLinks | FindingType::MetaIssue) {
                continue;
            }
            let Some(page_url) = &finding.page_url else { continue };
            let condition_clear = match finding.finding_type {
                FindingType::BrokenLinks => {
                    self.store.broken_links_for_page(page_url).await.unwrap_or_default().is_empty()
                }
                FindingType::MetaIssue => {
                    pages.iter().find(|p| &p.canonical_url == page_url).map(|p| p.meta_issues.is_empty()).unwrap_or(false)
                }
                _ => false,
            };
            if condition_clear {
                self.store.update_finding_status(finding.id, FindingStatus::Resolved).await?;
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    async fn keyword_coverage_analysis(&self) -> Result<Vec<KeywordCoverage>> {
        let since = Utc::now() - chrono::Duration::days(7);
        let signals: Vec<healthwatch_core::entities::Signal> = self
            .store
            .client()
            .select(
                "signals",
                &[],
                &[
                    "or=(event_type.eq.trending_search_term,event_type.eq.high_cpc_alert)",
                    &format!("created_at=gte.{}", since.to_rfc3339()),
                    "limit=100",
                ],
            )
            .await?;

        let mut keywords: Vec<String> = signals
            .iter()
            .filter_map(|s| s.payload.get("keyword").and_then(|v| v.as_str()).map(str::to_string))
            .collect();
        keywords.sort();
        keywords.dedup();

        let today = Utc::now().date_naive();
        let window = (today - chrono::Duration::days(30), today);
        let mut coverage = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let rows = self.search_index.query_contains(&keyword, window).await.unwrap_or_default();
            let has_organic_page = rows.iter().any(|r| r.position <= 20.0);
            coverage.push(KeywordCoverage { keyword, has_organic_page });
        }
        Ok(coverage)
    }

    async fn compute_trend_snapshot(
        &self,
        pages: &[healthwatch_core::entities::Page],
        window: (chrono::NaiveDate, chrono::NaiveDate),
    ) -> Result<TrendSnapshot> {
        let total_traffic: u64 = {
            let mut total = 0u64;
            for page in pages {
                let (path, _) = page.path_for_analytics_join();
                if let Ok(rows) = self.store.latest_analytics(&path, 1).await {
                    if let Some(row) = rows.into_iter().next() {
                        total += row.active_users;
                    }
                }
            }
            total
        };

        let previous = self.store.previous_trend_snapshot(PeriodType::Weekly).await?;
        let traffic_change_pct = match &previous {
            Some(p) if p.total_traffic > 0 => {
                100.0 * (total_traffic as f64 - p.total_traffic as f64) / p.total_traffic as f64
            }
            _ => 0.0,
        };

        let scored: Vec<u32> = pages.iter().filter_map(|p| p.health_score).collect();
        let avg_health_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<u32>() as f64 / scored.len() as f64
        };

        let mut distribution = [0u32; 5];
        for score in &scored {
            let bucket = (*score as usize / 20).min(4);
            distribution[bucket] += 1;
        }

        let mut by_change: Vec<(String, f64)> = Vec::new();
        for page in pages {
            let (path, _) = page.path_for_analytics_join();
            if let Ok(rows) = self.store.latest_analytics(&path, 1).await {
                if let Some(row) = rows.into_iter().next() {
                    by_change.push((page.canonical_url.clone(), row.traffic_change_pct));
                }
            }
        }
        by_change.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let top_declining_pages: Vec<PageTrendEntry> = by_change
            .iter()
            .take(5)
            .map(|(url, pct)| PageTrendEntry { page_url: url.clone(), traffic_change_pct: *pct })
            .collect();
        let top_improving_pages: Vec<PageTrendEntry> = by_change
            .iter()
            .rev()
            .take(5)
            .map(|(url, pct)| PageTrendEntry { page_url: url.clone(), traffic_change_pct: *pct })
            .collect();

        let broken_links_count: u32 = {
            let mut count = 0u32;
            for page in pages {
                count += self.store.broken_links_for_page(&page.canonical_url).await?.len() as u32;
            }
            count
        };
        let new_broken_links = previous.as_ref().map(|p| broken_links_count.saturating_sub(p.broken_links_count)).unwrap_or(0);
        let meta_issues_count = pages.iter().map(|p| p.meta_issues.len() as u32).sum();

        Ok(TrendSnapshot {
            id: Uuid::new_v4(),
            period_type: PeriodType::Weekly,
            period_start: window.0,
            period_end: window.1,
            total_traffic,
            traffic_change_pct,
            avg_health_score,
            health_score_distribution: distribution,
            top_declining_pages,
            top_improving_pages,
            broken_links_count,
            new_broken_links,
            meta_issues_count,
            created_at: Utc::now(),
        })
    }

    async fn render_digest(&self, snapshot: &TrendSnapshot, report: &WeeklyReport) -> Result<()> {
        let figures = serde_json::json!({
            "total_traffic": snapshot.total_traffic,
            "traffic_change_pct": snapshot.traffic_change_pct,
            "avg_health_score": snapshot.avg_health_score,
            "broken_links_count": snapshot.broken_links_count,
            "new_broken_links": snapshot.new_broken_links,
            "stale_page_count": report.stale_page_count,
            "conversion_tracking_health": report.conversion_audit.as_ref().map(|a| format!("{:?}", a.tracking_health)),
        });

        let summary = self.request_digest_summary(&figures).await.unwrap_or_else(|| {
            format!(
                "Weekly health check: traffic {:+.1}%, avg score {:.0}/100, {} broken link(s).",
                snapshot.traffic_change_pct, snapshot.avg_health_score, snapshot.broken_links_count
            )
        });

        let digest = WeeklyDigest {
            id: Uuid::new_v4(),
            period_start: snapshot.period_start,
            period_end: snapshot.period_end,
            summary,
            figures,
            created_at: Utc::now(),
        };
        self.store.insert_weekly_digest(&digest).await
    }

    /// Best-effort: a failed or slow model call falls back to the
    /// deterministic summary built by the caller (§4.11 step 9).
    async fn request_digest_summary(&self, figures: &serde_json::Value) -> Option<String> {
        let llm = healthwatch_agent::LlmClient::new(self.agent_llm_api_key.clone(), self.agent_llm_model.clone());
        let prompt = format!(
            "Summarize this week's website health figures in at most three sentences: {figures}"
        );
        let messages = vec![healthwatch_agent::llm::ChatMessage { role: "user".to_string(), content: prompt }];
        let result = tokio::time::timeout(
            Duration::from_secs(self.config.speed_check_cutoff_secs.min(20)),
            llm.next_turn("You write short, factual weekly summaries.", &messages, &[]),
        )
        .await;
        match result {
            Ok(Ok(turn)) => turn.text,
            _ => None,
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}
