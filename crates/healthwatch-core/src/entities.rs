//! Entities from §3 of the design. All timestamps are UTC; dates for
//! per-day snapshots use `NaiveDate` since snapshot identity is
//! `(page_url, snapshot_date)` with no time-of-day component.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Landing,
    Site,
    Blog,
    Pillar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaIssue {
    MissingTitle,
    MissingMeta,
    TitleTooLong,
    TitleTooShort,
    MetaTooLong,
    MetaTooShort,
    DuplicateTitle,
    DuplicateMeta,
}

/// Per-dimension breakdown of a page's health score. Invariant: `total` is
/// the sum of the other six fields (§8 property 1).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HealthScoreBreakdown {
    pub traffic_trend: u32,
    pub seo_ranking: u32,
    pub page_speed: u32,
    pub content_freshness: u32,
    pub conversion_health: u32,
    pub technical_health: u32,
}

impl HealthScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.traffic_trend
            + self.seo_ranking
            + self.page_speed
            + self.content_freshness
            + self.conversion_health
            + self.technical_health
    }

    pub fn is_flagged(&self) -> bool {
        self.total() < 50
    }

    pub fn is_critical(&self) -> bool {
        self.total() < 30
    }
}

/// Identity = canonical URL (unique).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub canonical_url: String,
    pub slug: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub page_type: PageType,
    pub cms_page_id: Option<String>,
    #[serde(default)]
    pub has_form: bool,
    #[serde(default)]
    pub form_ids: Vec<String>,
    #[serde(default)]
    pub has_cta: bool,
    #[serde(default)]
    pub cta_ids: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Derived: `floor((now - last_updated_at) / day)`, or `None` when unknown.
    pub content_age_days: Option<i64>,
    #[serde(default = "default_true")]
    pub is_indexed: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub meta_issues: BTreeSet<MetaIssue>,
    #[serde(default)]
    pub has_broken_links: bool,
    #[serde(default)]
    pub broken_link_count: u32,
    pub health_score: Option<u32>,
    pub health_score_breakdown: Option<HealthScoreBreakdown>,
    pub last_health_check_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Page {
    pub fn title_length(&self) -> usize {
        self.title.as_deref().map(str::len).unwrap_or(0)
    }

    pub fn meta_description_length(&self) -> usize {
        self.meta_description.as_deref().map(str::len).unwrap_or(0)
    }

    /// Path component of `canonical_url`, used to join against analytics rows
    /// which are keyed by path (§4.8 "URL-matching policy"). Returns the raw
    /// string unchanged when it fails to parse as a URL — the open question
    /// in §9 notes this never matches analytics by path, and callers should
    /// count and log it rather than silently resolve it.
    pub fn path_for_analytics_join(&self) -> (String, bool) {
        match url::Url::parse(&self.canonical_url) {
            Ok(u) => (u.path().to_string(), true),
            Err(_) => (self.canonical_url.clone(), false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub page_url: String,
    pub snapshot_date: NaiveDate,
    pub active_users: u64,
    pub sessions: u64,
    pub page_views: u64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
    pub users_previous_period: u64,
    pub sessions_previous_period: u64,
    pub traffic_change_pct: f64,
}

impl AnalyticsSnapshot {
    /// `100 * (active_users - users_previous_period) / users_previous_period`,
    /// or 0 when the previous period had no users.
    pub fn compute_traffic_change_pct(active_users: u64, users_previous_period: u64) -> f64 {
        if users_previous_period > 0 {
            100.0 * (active_users as f64 - users_previous_period as f64) / users_previous_period as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TrafficSourceBreakdown {
    pub organic: u64,
    pub paid: u64,
    pub direct: u64,
    pub referral: u64,
    pub social: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEvent {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSnapshot {
    pub page_url: String,
    pub snapshot_date: NaiveDate,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub avg_ctr: f64,
    pub avg_position: f64,
    pub previous_clicks: u64,
    pub previous_impressions: u64,
    pub previous_ctr: f64,
    pub previous_position: f64,
    /// Positive = improved (`prev_position - current_position`).
    pub position_change: f64,
}

impl SearchSnapshot {
    pub fn compute_position_change(previous_position: f64, current_position: f64) -> f64 {
        previous_position - current_position
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopQuery {
    pub query: String,
    pub clicks: u64,
    pub impressions: u64,
    pub position: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedStrategy {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedOpportunity {
    pub title: String,
    pub description: String,
    pub estimated_savings_ms: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedScore {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub page_url: String,
    pub test_date: NaiveDate,
    pub strategy: SpeedStrategy,
    pub performance_score: u8,
    pub accessibility_score: u8,
    pub seo_score: u8,
    pub best_practices_score: u8,
    pub lcp_ms: u32,
    pub fid_ms: u32,
    pub cls: f64,
    pub inp_ms: u32,
    /// Bounded to at most 10 entries, ranked most-impactful first.
    pub opportunities: Vec<SpeedOpportunity>,
    pub tested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Internal,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkHealthRecord {
    pub source_page_url: String,
    pub target_url: String,
    pub link_type: LinkType,
    pub http_status: Option<u16>,
    pub is_broken: bool,
    pub is_redirect: bool,
    #[serde(default)]
    pub redirect_chain: Vec<String>,
    #[serde(default)]
    pub redirect_count: u32,
    pub error_message: Option<String>,
    pub first_detected_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    #[serde(default)]
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl LinkHealthRecord {
    /// §3 invariant: `is_broken` implies an out-of-range or missing status.
    pub fn compute_is_broken(http_status: Option<u16>) -> bool {
        match http_status {
            Some(s) => !(200..=399).contains(&s),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    TrafficDrop,
    RankingLoss,
    SpeedAlert,
    MetaIssue,
    BrokenLinks,
    ConversionGap,
    KeywordGap,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    New,
    RecommendationDrafted,
    Approved,
    Completed,
    Expired,
    Skipped,
    Resolved,
}

impl FindingStatus {
    /// Findings in these statuses block a fresh agent-loop investigation for
    /// the same page (§4.9 "Dedup pre-check").
    pub const DEDUP_BLOCKING: [FindingStatus; 3] =
        [FindingStatus::New, FindingStatus::RecommendationDrafted, FindingStatus::Approved];

    pub fn is_terminal(&self) -> bool {
        matches!(self, FindingStatus::Completed | FindingStatus::Expired | FindingStatus::Resolved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub page_url: Option<String>,
    pub finding_type: FindingType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub business_impact: String,
    #[serde(default)]
    pub agent_loop_iterations: u32,
    #[serde(default)]
    pub tools_used: BTreeSet<String>,
    pub investigation_summary: String,
    pub status: FindingStatus,
    pub skip_reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub health_score_at_detection: Option<u32>,
    pub health_score_at_resolution: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    UpdateMetaTags,
    InvestigateTrafficDrop,
    InvestigateRankingLoss,
    FixBrokenLinks,
    ImprovePageSpeed,
    ReviewConversionPath,
    ReviewContent,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionQueueItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub finding_id: Option<Uuid>,
    pub action_type: ActionType,
    pub action_summary: String,
    pub action_detail: serde_json::Value,
    pub severity: Severity,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub priority: u8,
    pub status: QueueStatus,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DecisionQueueItem {
    /// critical→10, high→8, medium→5, else 3 (§4.9 terminal semantics).
    pub fn priority_for_severity(severity: Severity) -> u8 {
        match severity {
            Severity::Critical => 10,
            Severity::High => 8,
            Severity::Medium => 5,
            Severity::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeLogOutcome {
    Pending,
    Rejected,
    Executed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub action: String,
    pub outcome: ChangeLogOutcome,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    Warn,
    Block,
    Alert,
}

/// Only two rule shapes are interpreted (§9 open question); other
/// `rule_category` values are accepted and carried but not evaluated —
/// see `healthwatch-agent::guardrails` for the documented gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule_category", rename_all = "snake_case")]
pub enum GuardrailRule {
    MinConfidence { min_confidence: f64 },
    BlockedActionTypes { action_types: Vec<ActionType> },
    #[serde(other)]
    Unimplemented,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardrail {
    pub name: String,
    pub rule: GuardrailRule,
    pub violation_action: ViolationAction,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTrendEntry {
    pub page_url: String,
    pub traffic_change_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_traffic: u64,
    pub traffic_change_pct: f64,
    pub avg_health_score: f64,
    /// 5 buckets: [0-20), [20-40), [40-60), [60-80), [80-100].
    pub health_score_distribution: [u32; 5],
    pub top_declining_pages: Vec<PageTrendEntry>,
    pub top_improving_pages: Vec<PageTrendEntry>,
    pub broken_links_count: u32,
    pub new_broken_links: u32,
    pub meta_issues_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub source_agent: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub const SIGNAL_SOURCE_AGENT: &str = "thyme";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub finding_id: Option<Uuid>,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingHealth {
    NotConfigured,
    Healthy,
    Degraded,
    Broken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionGap {
    pub form_name: String,
    pub expected_event_name: String,
    pub submission_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionAudit {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub tracking_health: TrackingHealth,
    pub configured_events: Vec<String>,
    pub forms_total: u32,
    pub submissions_total: u64,
    pub gaps: Vec<ConversionGap>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyDigest {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub summary: String,
    pub figures: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Vec<String>,
}
