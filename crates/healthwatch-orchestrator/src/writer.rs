//! Finding/Recommendation Writer (C10, §4.10). Wraps the terminal-action and
//! review side effects: every queue-affecting event produces a
//! `ChangeLogEntry` and a `Notification` alongside the row it describes.

use chrono::Utc;
use healthwatch_core::entities::{
    ChangeLogEntry, ChangeLogOutcome, DecisionQueueItem, Finding, FindingStatus, Notification, QueueStatus,
};
use healthwatch_core::error::Result;
use healthwatch_core::store::Store;
use uuid::Uuid;

/// Called once the agent loop (C9) has inserted a `Finding` and its
/// `DecisionQueueItem`: appends the audit log entry and the reviewer-facing
/// notification that accompany every new recommendation.
pub async fn record_submission(store: &Store, finding: &Finding, decision: &DecisionQueueItem) -> Result<()> {
    let log_entry = ChangeLogEntry {
        id: Uuid::new_v4(),
        action: decision.action_summary.clone(),
        outcome: ChangeLogOutcome::Pending,
        executed_at: None,
        executed_by: None,
        details: serde_json::json!({ "finding_id": finding.id, "decision_id": decision.id }),
        created_at: Utc::now(),
    };
    store.append_change_log(&log_entry).await?;

    let notification = Notification {
        id: Uuid::new_v4(),
        finding_id: Some(finding.id),
        severity: finding.severity,
        message: format!("New recommendation: {}", finding.title),
        created_at: Utc::now(),
        read_at: None,
    };
    store.insert_notification(&notification).await
}

pub enum ReviewDecision {
    Approve,
    Reject,
}

/// The human review operation (§4.10): transitions the queue item, mirrors
/// the outcome onto the finding, and appends both an audit entry and a
/// notification. Fails with `ReviewConflict` (propagated from the store) if
/// the item was already reviewed.
pub async fn review(
    store: &Store,
    decision_id: Uuid,
    decision: ReviewDecision,
    reviewer: &str,
    review_notes: Option<&str>,
) -> Result<DecisionQueueItem> {
    let (queue_status, finding_status, outcome) = match decision {
        ReviewDecision::Approve => (QueueStatus::Approved, FindingStatus::Approved, ChangeLogOutcome::Executed),
        ReviewDecision::Reject => (QueueStatus::Rejected, FindingStatus::Expired, ChangeLogOutcome::Rejected),
    };

    let updated = store.review_decision(decision_id, queue_status, reviewer, review_notes).await?;

    if let Some(finding_id) = updated.finding_id {
        store.update_finding_status(finding_id, finding_status).await?;
    }

    let log_entry = ChangeLogEntry {
        id: Uuid::new_v4(),
        action: updated.action_summary.clone(),
        outcome,
        executed_at: Some(Utc::now()),
        executed_by: Some(reviewer.to_string()),
        details: serde_json::json!({ "decision_id": updated.id, "finding_id": updated.finding_id }),
        created_at: Utc::now(),
    };
    store.append_change_log(&log_entry).await?;

    let notification = Notification {
        id: Uuid::new_v4(),
        finding_id: updated.finding_id,
        severity: updated.severity,
        message: format!("Recommendation reviewed ({:?}): {}", updated.status, updated.action_summary),
        created_at: Utc::now(),
        read_at: None,
    };
    store.insert_notification(&notification).await?;

    Ok(updated)
}
