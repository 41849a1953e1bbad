use serde::{Deserialize, Serialize};

/// A capability of the backend. `enabled` is the persisted intent,
/// `active` the runtime effect; the backend is expected to keep
/// `active => enabled`, but the dashboard renders both as-is and never
/// assumes the implication holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeIntent {
    Enable,
    Disable,
}

impl ChangeIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeIntent::Enable => "enable",
            ChangeIntent::Disable => "disable",
        }
    }
}

/// A staged, not-yet-applied enable/disable intent for one tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingChange {
    pub tool_name: String,
    pub intent: ChangeIntent,
}

impl PendingChange {
    /// Wire form expected by the save-and-reload endpoint.
    pub fn wire_tag(&self) -> String {
        format!("{}:{}", self.intent.as_str(), self.tool_name)
    }
}
