//! The agent loop's closed tool set (§4.9, §9 "tool registry is a closed
//! variant with a shared execution signature"). Non-terminal tools look up
//! data through the store/adapters; terminal tools end the loop and are
//! dispatched directly by `AgentLoop`, not through `execute_non_terminal`.

use chrono::Utc;
use healthwatch_core::entities::Signal;
use healthwatch_core::error::{HealthWatchError, Result};
use healthwatch_core::store::Store;
use serde_json::json;

pub const NON_TERMINAL_TOOLS: &[&str] = &[
    "get_page_analytics",
    "get_page_rankings",
    "get_page_speed_detail",
    "get_hubspot_page_detail",
    "check_keyword_page_gap",
    "check_signal_bus",
    "evaluate_recommendation",
];

pub const TERMINAL_TOOLS: &[&str] = &["submit_finding", "skip_finding"];

pub fn catalog() -> Vec<crate::llm::ToolDefinition> {
    use crate::llm::ToolDefinition;
    vec![
        ToolDefinition {
            name: "get_page_analytics".to_string(),
            description: "Fetch recent traffic analytics for a page path.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "page_path": {"type": "string"},
                    "days": {"type": "integer", "maximum": 30}
                },
                "required": ["page_path"]
            }),
        },
        ToolDefinition {
            name: "get_page_rankings".to_string(),
            description: "Fetch recent search rankings for a page URL.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "page_url": {"type": "string"},
                    "days": {"type": "integer", "maximum": 30}
                },
                "required": ["page_url"]
            }),
        },
        ToolDefinition {
            name: "get_page_speed_detail".to_string(),
            description: "Fetch the most recent speed test result for a URL and strategy.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "strategy": {"type": "string", "enum": ["mobile", "desktop"]}
                },
                "required": ["url", "strategy"]
            }),
        },
        ToolDefinition {
            name: "get_hubspot_page_detail".to_string(),
            description: "Fetch CMS record detail for a page URL.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"page_url": {"type": "string"}},
                "required": ["page_url"]
            }),
        },
        ToolDefinition {
            name: "check_keyword_page_gap".to_string(),
            description: "Check whether any page ranks for a given keyword.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"keyword": {"type": "string"}},
                "required": ["keyword"]
            }),
        },
        ToolDefinition {
            name: "check_signal_bus".to_string(),
            description: "Query recent cross-agent signals for a topic (event_type).".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"topic": {"type": "string"}},
                "required": ["topic"]
            }),
        },
        ToolDefinition {
            name: "evaluate_recommendation".to_string(),
            description: "Check a draft recommendation against active guardrails before submitting.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action_type": {"type": "string"},
                    "action_summary": {"type": "string"},
                    "severity": {"type": "string"},
                    "confidence": {"type": "number"}
                },
                "required": ["action_type", "action_summary", "severity", "confidence"]
            }),
        },
        ToolDefinition {
            name: "submit_finding".to_string(),
            description: "Terminal: submit a finding and recommendation for human review.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "finding_type": {"type": "string"},
                    "severity": {"type": "string"},
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "business_impact": {"type": "string"},
                    "investigation_summary": {"type": "string"},
                    "action_type": {"type": "string"},
                    "action_summary": {"type": "string"},
                    "action_detail": {"type": "object"},
                    "confidence": {"type": "number"},
                    "risk_level": {"type": "string"}
                },
                "required": ["finding_type", "severity", "title", "description", "business_impact", "investigation_summary", "action_type", "action_summary"]
            }),
        },
        ToolDefinition {
            name: "skip_finding".to_string(),
            description: "Terminal: record that no recommendation is warranted, with a reason.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string"},
                    "investigation_summary": {"type": "string"}
                },
                "required": ["reason", "investigation_summary"]
            }),
        },
    ]
}

/// Context passed to every non-terminal tool: read-only store access and the
/// adapters needed to answer a tool query without re-running a full scan.
pub struct ToolContext<'a> {
    pub store: &'a Store,
    pub search_index: Option<&'a healthwatch_adapters::search_index::SearchIndexAdapter>,
}

pub async fn execute_non_terminal(name: &str, input: &serde_json::Value, ctx: &ToolContext<'_>) -> Result<serde_json::Value> {
    match name {
        "get_page_analytics" => {
            let page_path = input.get("page_path").and_then(|v| v.as_str()).unwrap_or_default();
            let rows = ctx.store.latest_analytics(page_path, 5).await?;
            Ok(json!({ "snapshots": rows }))
        }
        "get_page_rankings" => {
            let page_url = input.get("page_url").and_then(|v| v.as_str()).unwrap_or_default();
            let rows = ctx.store.latest_search(page_url, 5).await?;
            Ok(json!({ "snapshots": rows }))
        }
        "get_page_speed_detail" => {
            let url = input.get("url").and_then(|v| v.as_str()).unwrap_or_default();
            let score = ctx.store.latest_speed_score(url).await?;
            Ok(json!({ "speed_score": score }))
        }
        "get_hubspot_page_detail" => {
            let page_url = input.get("page_url").and_then(|v| v.as_str()).unwrap_or_default();
            let page = ctx.store.page_by_url(page_url).await?;
            Ok(json!({ "page": page }))
        }
        "check_keyword_page_gap" => {
            let keyword = input.get("keyword").and_then(|v| v.as_str()).unwrap_or_default();
            let window = (Utc::now().date_naive() - chrono::Duration::days(30), Utc::now().date_naive());
            match ctx.search_index {
                Some(adapter) => {
                    let rows = adapter.query_contains(keyword, window).await.unwrap_or_default();
                    let has_organic_page = rows.iter().any(|r| r.position <= 20.0);
                    Ok(json!({ "keyword": keyword, "has_organic_page": has_organic_page, "matches": rows.len() }))
                }
                None => Ok(json!({ "keyword": keyword, "has_organic_page": null, "checked": false })),
            }
        }
        "check_signal_bus" => {
            let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or_default();
            let since = Utc::now() - chrono::Duration::days(30);
            let signals: Vec<Signal> = ctx
                .store
                .client()
                .select(
                    "signals",
                    &[],
                    &[
                        &format!("event_type=eq.{topic}"),
                        &format!("created_at=gte.{}", since.to_rfc3339()),
                        "limit=20",
                    ],
                )
                .await?;
            Ok(json!({ "signals": signals }))
        }
        "evaluate_recommendation" => {
            let action_type = input.get("action_type").and_then(|v| v.as_str()).unwrap_or_default();
            let confidence = input.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let guardrails = ctx.store.active_guardrails().await?;
            let verdict = crate::guardrails::evaluate(action_type, confidence, &guardrails);
            Ok(serde_json::to_value(verdict)?)
        }
        other => Err(HealthWatchError::Data(format!("unknown non-terminal tool '{other}'"))),
    }
}
