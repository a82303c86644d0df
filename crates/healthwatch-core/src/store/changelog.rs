//! Change log (§3): append-only audit trail of every executed or rejected
//! action, threaded with the run_id that produced it (§11).

use super::Store;
use crate::entities::ChangeLogEntry;
use crate::error::Result;

impl Store {
    pub async fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        let row = serde_json::to_value(entry)?;
        self.client.insert("change_log", &[row]).await
    }
}
