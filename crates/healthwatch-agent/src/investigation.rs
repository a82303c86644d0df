//! Agent Loop (C9, §4.9): a bounded, tool-using investigation of a single
//! flagged page. Represented as an explicit state machine per §9 — terminal
//! tool dispatch is a match on tool name, not an exception-based unwind.

use crate::llm::{ChatMessage, LlmClient};
use crate::tools::{self, ToolContext};
use chrono::{Duration as ChronoDuration, Utc};
use healthwatch_adapters::search_index::SearchIndexAdapter;
use healthwatch_core::entities::{
    ActionType, DecisionQueueItem, Finding, FindingType, Page, QueueStatus, RiskLevel, Severity,
};
use healthwatch_core::error::Result;
use healthwatch_core::store::Store;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;
use uuid::Uuid;

pub const MAX_TOOL_CALLS: u32 = 6;
pub const MAX_DURATION_MS: u64 = 40_000;

#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub duration_ms: u64,
}

#[derive(Debug)]
enum AgentState {
    AwaitingModel,
    ExecutingTools,
    TerminalSubmit,
    TerminalSkip,
    ForcedSkip,
}

pub struct FlaggedPageContext {
    pub page: Page,
    pub flag_reasons: Vec<String>,
    pub analytics_summary: serde_json::Value,
    pub search_summary: serde_json::Value,
    pub speed_summary: serde_json::Value,
}

pub enum AgentLoopOutcome {
    /// The dedup pre-check found a blocking finding; the loop was never invoked.
    Deduped { existing_finding_id: Uuid },
    Submitted { finding: Finding, decision: DecisionQueueItem },
    Skipped { finding: Finding },
}

pub struct AgentLoop {
    llm: LlmClient,
    store: Store,
    search_index: Option<std::sync::Arc<SearchIndexAdapter>>,
}

impl AgentLoop {
    pub fn new(llm: LlmClient, store: Store, search_index: Option<std::sync::Arc<SearchIndexAdapter>>) -> Self {
        Self { llm, store, search_index }
    }

    pub async fn investigate(&self, flagged: FlaggedPageContext) -> Result<AgentLoopOutcome> {
        if let Some(existing) = self.store.blocking_finding_for_page(&flagged.page.canonical_url).await? {
            return Ok(AgentLoopOutcome::Deduped { existing_finding_id: existing.id });
        }

        let system_prompt = self.system_prompt();
        let mut messages = vec![ChatMessage { role: "user".to_string(), content: self.initial_prompt(&flagged) }];
        let tool_catalog = tools::catalog();
        let ctx = ToolContext { store: &self.store, search_index: self.search_index.as_deref() };

        let started = Instant::now();
        let mut iterations: u32 = 0;
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut tools_used: BTreeSet<String> = BTreeSet::new();
        let mut state = AgentState::AwaitingModel;

        loop {
            match state {
                AgentState::AwaitingModel => {
                    if started.elapsed().as_millis() as u64 >= MAX_DURATION_MS {
                        state = AgentState::ForcedSkip;
                        continue;
                    }
                    let turn = self.llm.next_turn(&system_prompt, &messages, &tool_catalog).await?;
                    if turn.tool_uses.is_empty() {
                        // Malformed: no tool-use blocks (§4.9 "treat as malformed").
                        state = AgentState::ForcedSkip;
                        continue;
                    }
                    if let Some(text) = &turn.text {
                        messages.push(ChatMessage { role: "assistant".to_string(), content: text.clone() });
                    }
                    let terminal = turn.tool_uses.iter().find(|t| tools::TERMINAL_TOOLS.contains(&t.name.as_str()));
                    if let Some(terminal_use) = terminal {
                        let outcome = self
                            .dispatch_terminal(&terminal_use.name, &terminal_use.input, &flagged, iterations, &tool_calls, &tools_used)
                            .await?;
                        return Ok(outcome);
                    }
                    messages.push(ChatMessage {
                        role: "assistant_tool_requests".to_string(),
                        content: serde_json::to_string(&turn.tool_uses).unwrap_or_default(),
                    });
                    state = AgentState::ExecutingTools;
                    // fall through to execute the requested non-terminal tools below
                    for use_req in &turn.tool_uses {
                        if iterations >= MAX_TOOL_CALLS || started.elapsed().as_millis() as u64 >= MAX_DURATION_MS {
                            state = AgentState::ForcedSkip;
                            break;
                        }
                        let call_started = Instant::now();
                        let output = tools::execute_non_terminal(&use_req.name, &use_req.input, &ctx)
                            .await
                            .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}));
                        let duration_ms = call_started.elapsed().as_millis() as u64;
                        tools_used.insert(use_req.name.clone());
                        tool_calls.push(ToolCall {
                            tool_name: use_req.name.clone(),
                            input: use_req.input.clone(),
                            output: output.clone(),
                            duration_ms,
                        });
                        messages.push(ChatMessage {
                            role: "tool_result".to_string(),
                            content: serde_json::to_string(&output).unwrap_or_default(),
                        });
                        iterations += 1;
                    }
                    if matches!(state, AgentState::ExecutingTools) {
                        state = AgentState::AwaitingModel;
                    }
                }
                AgentState::ForcedSkip => {
                    let finding = self
                        .record_skip(&flagged, "Forced termination: tool-call or time budget exhausted", iterations, &tool_calls, &tools_used)
                        .await?;
                    return Ok(AgentLoopOutcome::Skipped { finding });
                }
                AgentState::ExecutingTools | AgentState::TerminalSubmit | AgentState::TerminalSkip => {
                    unreachable!("terminal states return directly from their dispatch site")
                }
            }
        }
    }

    fn system_prompt(&self) -> String {
        "You are a website health investigator. You have access to a closed set of tools. \
         Investigate the flagged page, then call exactly one terminal tool: submit_finding \
         (with a concrete recommendation) or skip_finding (with a reason)."
            .to_string()
    }

    fn initial_prompt(&self, flagged: &FlaggedPageContext) -> String {
        let page = &flagged.page;
        format!(
            "Page: {url}\nType: {page_type:?}\nTitle: {title}\nScore: {score:?}\nFlag reasons: {reasons:?}\n\
             Last updated: {updated:?}\nHas form: {has_form}\nMeta issues: {meta_issues:?}\nHas broken links: {broken}\n\
             Analytics: {analytics}\nSearch: {search}\nSpeed: {speed}",
            url = page.canonical_url,
            page_type = page.page_type,
            title = page.title.clone().unwrap_or_default(),
            score = page.health_score,
            reasons = flagged.flag_reasons,
            updated = page.last_updated_at,
            has_form = page.has_form,
            meta_issues = page.meta_issues,
            broken = page.has_broken_links,
            analytics = flagged.analytics_summary,
            search = flagged.search_summary,
            speed = flagged.speed_summary,
        )
    }

    async fn dispatch_terminal(
        &self,
        tool_name: &str,
        input: &serde_json::Value,
        flagged: &FlaggedPageContext,
        iterations: u32,
        tool_calls: &[ToolCall],
        tools_used: &BTreeSet<String>,
    ) -> Result<AgentLoopOutcome> {
        match tool_name {
            "submit_finding" => self.submit_finding(input, flagged, iterations, tools_used).await,
            "skip_finding" => {
                let reason = input.get("reason").and_then(|v| v.as_str()).unwrap_or("no reason given").to_string();
                let finding = self.record_skip(flagged, &reason, iterations, tool_calls, tools_used).await?;
                Ok(AgentLoopOutcome::Skipped { finding })
            }
            other => {
                let finding = self
                    .record_skip(flagged, &format!("unknown terminal tool '{other}'"), iterations, tool_calls, tools_used)
                    .await?;
                Ok(AgentLoopOutcome::Skipped { finding })
            }
        }
    }

    async fn submit_finding(
        &self,
        input: &serde_json::Value,
        flagged: &FlaggedPageContext,
        iterations: u32,
        tools_used: &BTreeSet<String>,
    ) -> Result<AgentLoopOutcome> {
        let now = Utc::now();
        let get_str = |key: &str| input.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let severity = parse_severity(&get_str("severity"));
        let finding_type = parse_finding_type(&get_str("finding_type"));
        let confidence = input.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.7);
        let action_type = parse_action_type(&get_str("action_type"));

        let finding = Finding {
            id: Uuid::new_v4(),
            page_url: Some(flagged.page.canonical_url.clone()),
            finding_type,
            severity,
            title: get_str("title"),
            description: get_str("description"),
            business_impact: get_str("business_impact"),
            agent_loop_iterations: iterations,
            tools_used: tools_used.clone(),
            investigation_summary: get_str("investigation_summary"),
            status: healthwatch_core::entities::FindingStatus::RecommendationDrafted,
            skip_reason: None,
            expires_at: Some(now + ChronoDuration::hours(48)),
            health_score_at_detection: flagged.page.health_score,
            health_score_at_resolution: None,
            created_at: now,
        };
        self.store.insert_finding(&finding).await?;

        let decision = DecisionQueueItem {
            id: Uuid::new_v4(),
            finding_id: Some(finding.id),
            action_type,
            action_summary: get_str("action_summary"),
            action_detail: input.get("action_detail").cloned().unwrap_or(serde_json::json!({})),
            severity,
            confidence,
            risk_level: parse_risk_level(input.get("risk_level").and_then(|v| v.as_str())),
            priority: DecisionQueueItem::priority_for_severity(severity),
            status: QueueStatus::Pending,
            reviewer: None,
            reviewed_at: None,
            review_notes: None,
            expires_at: now + ChronoDuration::hours(48),
            created_at: now,
        };
        self.store.insert_decision(&decision).await?;

        self.emit_submit_signals(&finding, flagged).await;

        Ok(AgentLoopOutcome::Submitted { finding, decision })
    }

    async fn emit_submit_signals(&self, finding: &Finding, flagged: &FlaggedPageContext) {
        let bus = healthwatch_core::signal_bus::SignalBus::new(self.store.clone());
        let event_type = match finding.finding_type {
            FindingType::TrafficDrop => Some("page_traffic_drop"),
            FindingType::RankingLoss => Some("page_ranking_loss"),
            FindingType::SpeedAlert => Some("page_speed_alert"),
            _ => None,
        };
        if let Some(event) = event_type {
            bus.emit(event, serde_json::json!({"page_url": finding.page_url, "finding_id": finding.id})).await;
        }
        if flagged.page.health_score.map(|s| s < 30).unwrap_or(false) {
            bus.emit("page_health_critical", serde_json::json!({"page_url": finding.page_url, "finding_id": finding.id})).await;
        }
    }

    async fn record_skip(
        &self,
        flagged: &FlaggedPageContext,
        reason: &str,
        iterations: u32,
        tool_calls: &[ToolCall],
        tools_used: &BTreeSet<String>,
    ) -> Result<Finding> {
        let summary = if tool_calls.is_empty() {
            "No tools were executed before termination.".to_string()
        } else {
            format!("Executed {} tool call(s) before termination.", tool_calls.len())
        };
        let finding = Finding {
            id: Uuid::new_v4(),
            page_url: Some(flagged.page.canonical_url.clone()),
            finding_type: FindingType::Other,
            severity: Severity::Low,
            title: "Investigation skipped".to_string(),
            description: reason.to_string(),
            business_impact: String::new(),
            agent_loop_iterations: iterations,
            tools_used: tools_used.clone(),
            investigation_summary: summary,
            status: healthwatch_core::entities::FindingStatus::Skipped,
            skip_reason: Some(reason.to_string()),
            expires_at: None,
            health_score_at_detection: flagged.page.health_score,
            health_score_at_resolution: None,
            created_at: Utc::now(),
        };
        self.store.insert_finding(&finding).await?;
        Ok(finding)
    }
}

fn parse_severity(s: &str) -> Severity {
    serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap_or(Severity::Medium)
}

fn parse_finding_type(s: &str) -> FindingType {
    serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap_or(FindingType::Other)
}

fn parse_action_type(s: &str) -> ActionType {
    serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap_or(ActionType::Other)
}

fn parse_risk_level(s: Option<&str>) -> RiskLevel {
    s.and_then(|v| serde_json::from_value(serde_json::Value::String(v.to_string())).ok()).unwrap_or(RiskLevel::Low)
}
