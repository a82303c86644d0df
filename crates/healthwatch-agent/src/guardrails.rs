//! Guardrail evaluation (§4.9 "Guardrail evaluation"). Only two rule
//! shapes are interpreted, matching `GuardrailRule`'s documented closed
//! variants; other `rule_category` values are carried but produce neither a
//! violation nor a warning (§9 open question — left unimplemented, not
//! silently dropped).

use healthwatch_core::entities::{ActionType, Guardrail, GuardrailRule, ViolationAction};
use serde::Serialize;
use std::str::FromStr;

const HARD_MIN_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Serialize)]
pub struct GuardrailVerdict {
    pub passed: bool,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
}

/// `confidence < 0.3` always blocks regardless of configured guardrails
/// (§4.9 "Default hard rule").
pub fn evaluate(action_type: &str, confidence: f64, guardrails: &[Guardrail]) -> GuardrailVerdict {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    if confidence < HARD_MIN_CONFIDENCE {
        violations.push(format!("confidence {confidence:.2} is below the hard minimum of {HARD_MIN_CONFIDENCE}"));
    }

    let parsed_action = ActionType::from_str(action_type).ok();

    for guardrail in guardrails.iter().filter(|g| g.active) {
        let failed = match &guardrail.rule {
            GuardrailRule::MinConfidence { min_confidence } => confidence < *min_confidence,
            GuardrailRule::BlockedActionTypes { action_types } => {
                parsed_action.map(|a| action_types.contains(&a)).unwrap_or(false)
            }
            GuardrailRule::Unimplemented => false,
        };
        if !failed {
            continue;
        }
        let message = format!("guardrail '{}' failed", guardrail.name);
        match guardrail.violation_action {
            ViolationAction::Warn => warnings.push(message),
            ViolationAction::Block | ViolationAction::Alert => violations.push(message),
        }
    }

    GuardrailVerdict { passed: violations.is_empty(), violations, warnings }
}

impl FromStr for ActionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Mirrors the `#[serde(rename_all = "snake_case")]` mapping on
        // `ActionType` so tool input strings parse the same way stored rows do.
        let value = serde_json::Value::String(s.to_string());
        serde_json::from_value(value).map_err(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_always_blocks() {
        let verdict = evaluate("update_meta_tags", 0.2, &[]);
        assert!(!verdict.passed);
    }

    #[test]
    fn blocked_action_type_guardrail_blocks() {
        let guardrails = vec![Guardrail {
            name: "no-auto-fix".to_string(),
            rule: GuardrailRule::BlockedActionTypes { action_types: vec![ActionType::FixBrokenLinks] },
            violation_action: ViolationAction::Block,
            active: true,
        }];
        let verdict = evaluate("fix_broken_links", 0.9, &guardrails);
        assert!(!verdict.passed);
    }

    #[test]
    fn warn_guardrail_does_not_block() {
        let guardrails = vec![Guardrail {
            name: "prefer-high-confidence".to_string(),
            rule: GuardrailRule::MinConfidence { min_confidence: 0.95 },
            violation_action: ViolationAction::Warn,
            active: true,
        }];
        let verdict = evaluate("review_content", 0.8, &guardrails);
        assert!(verdict.passed);
        assert_eq!(verdict.warnings.len(), 1);
    }
}
