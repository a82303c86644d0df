//! Request handlers (§6 EXTERNAL INTERFACES). Scheduled/manual triggers run
//! the orchestrators; the rest are thin JSON views over the stores.

use crate::auth::bearer_matches;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use healthwatch_core::entities::{Finding, PeriodType};
use healthwatch_core::error::HealthWatchError;
use healthwatch_orchestrator::writer::{self, ReviewDecision};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "invalid or missing bearer token" }))).into_response()
}

/// Scheduled scan trigger (`0 14 * * 1,3,5` UTC). Runs the scan inline and
/// reports the §7 scan-response shape.
pub async fn trigger_scan(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !bearer_matches(&headers, &state.config.trigger_shared_secret) {
        return unauthorized();
    }
    run_scan_and_report(state).await
}

/// Scheduled weekly trigger (`0 14 * * 0` UTC).
pub async fn trigger_weekly(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !bearer_matches(&headers, &state.config.trigger_shared_secret) {
        return unauthorized();
    }
    let started = Instant::now();
    match state.weekly.run().await {
        Ok(report) => Json(serde_json::json!({
            "success": true,
            "links_resolved": report.links_resolved,
            "stale_page_count": report.stale_page_count,
            "duration_ms": started.elapsed().as_millis(),
            "step_errors": report.step_errors,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Manual trigger (§6): must respond within 1s, so the scan is dispatched
/// fire-and-forget on a detached task rather than awaited here.
pub async fn trigger_manual(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !bearer_matches(&headers, &state.config.trigger_shared_secret) {
        return unauthorized();
    }
    let scan = state.scan.clone();
    tokio::spawn(async move {
        match scan.run().await {
            Ok(report) => tracing::info!(?report, "manual scan complete"),
            Err(e) => tracing::error!(error = %e, "manual scan failed"),
        }
    });
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "dispatched": true }))).into_response()
}

async fn run_scan_and_report(state: AppState) -> Response {
    let started = Instant::now();
    match state.scan.run().await {
        Ok(report) => Json(serde_json::json!({
            "success": true,
            "pages_scanned": report.pages_scored,
            "pages_flagged": report.pages_flagged,
            "findings_created": report.findings_submitted,
            "broken_links_found": report.step_errors.iter().filter(|e| e.starts_with("link check")).count(),
            "meta_issues_found": report.step_errors.iter().filter(|e| e.starts_with("meta update")).count(),
            "duration_ms": started.elapsed().as_millis(),
            "step_errors": report.step_errors,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub id: uuid::Uuid,
    pub action: String,
    pub notes: Option<String>,
    /// Not required by §6's request shape; defaults to "reviewer" when absent.
    #[serde(default)]
    pub reviewer: Option<String>,
}

pub async fn review_decision(State(state): State<AppState>, Json(req): Json<ReviewRequest>) -> Response {
    let decision = match req.action.as_str() {
        "approve" => ReviewDecision::Approve,
        "reject" => ReviewDecision::Reject,
        other => {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": format!("unknown action '{other}'") })))
                .into_response()
        }
    };
    let reviewer = req.reviewer.as_deref().unwrap_or("reviewer");
    match writer::review(&state.store, req.id, decision, reviewer, req.notes.as_deref()).await {
        Ok(updated) => Json(serde_json::json!({ "id": updated.id, "status": updated.status })).into_response(),
        Err(HealthWatchError::ReviewConflict(id)) => {
            (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": format!("decision {id} is not pending") })))
                .into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() }))).into_response(),
    }
}

pub async fn overview(State(state): State<AppState>) -> Response {
    let pages = state.store.active_pages().await.unwrap_or_default();
    let flagged = pages.iter().filter(|p| p.health_score_breakdown.map(|b| b.is_flagged()).unwrap_or(false)).count();
    let critical = pages.iter().filter(|p| p.health_score_breakdown.map(|b| b.is_critical()).unwrap_or(false)).count();
    let avg_score = if pages.is_empty() {
        0.0
    } else {
        pages.iter().filter_map(|p| p.health_score).sum::<u32>() as f64 / pages.len() as f64
    };
    Json(serde_json::json!({
        "pages_total": pages.len(),
        "pages_flagged": flagged,
        "pages_critical": critical,
        "avg_health_score": avg_score,
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    #[serde(flatten)]
    pub filters: HashMap<String, String>,
}

/// Filtered/sorted/paginated page inventory view (§6 "pages filtered/sorted/paginated").
/// Filtering and sorting happen in memory: the site's inventory is small
/// enough that a dedicated query-building layer over the store isn't needed.
pub async fn list_pages(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let mut pages = state.store.active_pages().await.unwrap_or_default();

    if let Some(page_type) = query.filters.get("page_type") {
        pages.retain(|p| format!("{:?}", p.page_type).to_lowercase() == page_type.to_lowercase());
    }
    if query.filters.get("flagged").map(|v| v == "true").unwrap_or(false) {
        pages.retain(|p| p.health_score_breakdown.map(|b| b.is_flagged()).unwrap_or(false));
    }

    match query.sort.as_deref() {
        Some("health_score") => pages.sort_by_key(|p| p.health_score.unwrap_or(u32::MAX)),
        Some("-health_score") => pages.sort_by_key(|p| std::cmp::Reverse(p.health_score.unwrap_or(0))),
        Some("url") => pages.sort_by(|a, b| a.canonical_url.cmp(&b.canonical_url)),
        _ => {}
    }

    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
    let page_num = query.page.unwrap_or(1).max(1);
    let start = (page_num - 1) * per_page;
    let slice: Vec<_> = pages.into_iter().skip(start).take(per_page).collect();
    Json(serde_json::json!({ "pages": slice, "page": page_num, "per_page": per_page })).into_response()
}

#[derive(Deserialize)]
pub struct FindingQuery {
    pub status: Option<String>,
}

pub async fn list_findings(State(state): State<AppState>, Query(query): Query<FindingQuery>) -> Response {
    let mut filter: Vec<(&str, String)> = Vec::new();
    if let Some(status) = &query.status {
        filter.push(("status", status.clone()));
    }
    let findings: Vec<Finding> =
        state.store.client().select("findings", &filter, &["order=created_at.desc", "limit=100"]).await.unwrap_or_default();
    Json(serde_json::json!({ "findings": findings })).into_response()
}

#[derive(Deserialize)]
pub struct TrendQuery {
    pub period: Option<String>,
}

pub async fn trends(State(state): State<AppState>, Query(query): Query<TrendQuery>) -> Response {
    let period_type = match query.period.as_deref() {
        Some("daily") => PeriodType::Daily,
        _ => PeriodType::Weekly,
    };
    match state.store.latest_trend_snapshot(period_type).await {
        Ok(Some(snapshot)) => Json(serde_json::json!({ "trend": snapshot })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "no trend snapshot yet" }))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() }))).into_response(),
    }
}

pub async fn conversion_audit_latest(State(state): State<AppState>) -> Response {
    match state.store.latest_conversion_audit().await {
        Ok(Some(audit)) => Json(serde_json::json!({ "conversion_audit": audit })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "no conversion audit yet" }))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() }))).into_response(),
    }
}
