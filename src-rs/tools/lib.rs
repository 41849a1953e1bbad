pub mod console;
pub mod types;

pub use console::{apply_pending, FlushOutcome, ToolConsole};
pub use types::{ChangeIntent, PendingChange, Tool};
