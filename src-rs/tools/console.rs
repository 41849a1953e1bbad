use tracing::debug;

use crate::api::ApiClient;
use crate::result::DashResult;

use super::types::{ChangeIntent, PendingChange, Tool};

/// Outcome of a flush, for the caller's notice line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The buffer was empty; nothing was sent.
    Nothing,
    /// This many changes were applied and ground truth was reloaded.
    Applied(usize),
}

/// Owns the authoritative tool snapshot and the buffer of staged
/// enable/disable intents. Staging is display-only; the backend is touched
/// only by `flush` and `reload`, both of which replace the snapshot
/// wholesale.
pub struct ToolConsole {
    client: ApiClient,
    tools: Vec<Tool>,
    pending: Vec<PendingChange>,
}

impl ToolConsole {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            tools: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Last authoritative snapshot, without staged intents.
    pub fn snapshot(&self) -> &[Tool] {
        &self.tools
    }

    pub fn pending(&self) -> &[PendingChange] {
        &self.pending
    }

    /// What the operator sees: the snapshot with staged intents overlaid.
    pub fn display(&self) -> Vec<Tool> {
        apply_pending(&self.tools, &self.pending)
    }

    /// Stages one intent. At most one entry may exist per tool name, so any
    /// previous entry for the name is dropped first; the newest call wins.
    pub fn stage(&mut self, tool_name: &str, intent: ChangeIntent) {
        self.pending.retain(|change| change.tool_name != tool_name);
        self.pending.push(PendingChange {
            tool_name: tool_name.to_string(),
            intent,
        });
    }

    /// Sends the whole buffer as one save-and-reload request. On success the
    /// buffer is cleared and ground truth re-fetched; anything staged while
    /// the request was in flight is discarded along with it (known
    /// limitation, kept as-is). On failure the buffer is left intact and no
    /// partial application is assumed.
    pub async fn flush(&mut self) -> DashResult<FlushOutcome> {
        if self.pending.is_empty() {
            return Ok(FlushOutcome::Nothing);
        }
        let changes: Vec<String> = self.pending.iter().map(PendingChange::wire_tag).collect();
        self.client.save_and_reload_tools(&changes).await?;
        debug!(count = changes.len(), "tool changes applied");
        self.pending.clear();
        self.tools = self.client.list_tools().await?;
        Ok(FlushOutcome::Applied(changes.len()))
    }

    /// Discards the buffer unconditionally and replaces the snapshot with a
    /// fresh fetch.
    pub async fn reload(&mut self) -> DashResult<()> {
        self.pending.clear();
        self.tools = self.client.list_tools().await?;
        Ok(())
    }
}

/// Pure overlay of staged intents on a server snapshot. A staged tool shows
/// `enabled` and `active` both equal to the intent, before any round trip;
/// the next reload recomputes from ground truth and the optimism vanishes
/// with the buffer.
pub fn apply_pending(tools: &[Tool], pending: &[PendingChange]) -> Vec<Tool> {
    tools
        .iter()
        .cloned()
        .map(|mut tool| {
            if let Some(change) = pending.iter().find(|c| c.tool_name == tool.name) {
                let on = change.intent == ChangeIntent::Enable;
                tool.enabled = on;
                tool.active = on;
            }
            tool
        })
        .collect()
}
