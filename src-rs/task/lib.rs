pub mod monitor;
pub mod types;

pub use monitor::{MonitorView, PollHandle, TaskFilter, TaskMonitor};
pub use types::{Step, Task, TaskStats, TaskStatus, ToolCall};
