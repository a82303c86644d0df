//! Signal bus (C3, §4.3): an append-only stream other agents in the wider
//! system can read from and this pipeline writes to. Emission never fails
//! the caller — a dropped signal is a warning, not an aborted scan — mirroring
//! the teacher's federation bus, which never lets a broadcast failure
//! propagate into the orchestrator's own control flow.

use crate::entities::{Signal, SIGNAL_SOURCE_AGENT};
use crate::store::Store;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone)]
pub struct SignalBus {
    store: Store,
}

impl SignalBus {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Emit a signal tagged with this pipeline's source agent name. Logs and
    /// swallows any store error rather than returning it — see module docs.
    pub async fn emit(&self, event_type: impl Into<String>, payload: serde_json::Value) {
        let signal = Signal {
            id: Uuid::new_v4(),
            source_agent: SIGNAL_SOURCE_AGENT.to_string(),
            event_type: event_type.into(),
            payload,
            created_at: Utc::now(),
        };
        let row = match serde_json::to_value(&signal) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize signal, dropping");
                return;
            }
        };
        if let Err(e) = self.store.client().insert("signals", &[row]).await {
            tracing::warn!(error = %e, event_type = %signal.event_type, "failed to emit signal, dropping");
        }
    }

    /// Query signals by source agent, event-type membership, and a time
    /// window, bounded by `limit` (§4.3 "Query interface").
    pub async fn query(
        &self,
        source_agent: &str,
        event_types: &[&str],
        since: DateTime<Utc>,
        limit: u32,
    ) -> crate::error::Result<Vec<Signal>> {
        let extra_or = if event_types.is_empty() {
            String::new()
        } else {
            let list = event_types
                .iter()
                .map(|e| format!("event_type.eq.{e}"))
                .collect::<Vec<_>>()
                .join(",");
            format!("or=({list})")
        };
        let mut extra = vec![
            format!("created_at=gte.{}", since.to_rfc3339()),
            format!("limit={limit}"),
            "order=created_at.desc".to_string(),
        ];
        if !extra_or.is_empty() {
            extra.push(extra_or);
        }
        let extra_refs: Vec<&str> = extra.iter().map(String::as_str).collect();
        self.store
            .client()
            .select("signals", &[("source_agent", source_agent.to_string())], &extra_refs)
            .await
    }
}
