pub mod config;
pub mod result;

#[path = "api/lib.rs"]
pub mod api;
#[path = "task/lib.rs"]
pub mod task;
#[path = "tools/lib.rs"]
pub mod tools;

pub use api::ApiClient;
pub use config::DashConfig;
pub use result::{DashError, DashResult};
pub use task::{
    MonitorView, PollHandle, Step, Task, TaskFilter, TaskMonitor, TaskStats, TaskStatus, ToolCall,
};
pub use tools::{apply_pending, ChangeIntent, FlushOutcome, PendingChange, Tool, ToolConsole};
