use std::io::{self, Write};

use agent_dash_rs::{DashConfig, PendingChange, Task, TaskStats, Tool};
use serde_json::Value;

pub fn banner(cfg: &DashConfig) {
    println!("Agent Dashboard Console");
    println!("API: {}", cfg.base_url);
    println!("Poll: every {}s  Limit: {}", cfg.poll_secs, cfg.task_limit);
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                      Show commands");
    println!("  /exit | /quit              Exit");
    println!("  /tasks [status] [query]    List tasks (status goes to the server, query filters locally)");
    println!("  /stats                     Show task counts");
    println!("  /task <id>                 Show one task with its steps and tool calls");
    println!("  /cancel <id>               Cancel a running task");
    println!("  /delete <id>               Delete a completed or failed task");
    println!("  /watch [on|off]            Toggle background list refresh");
    println!("  /tools                     List tools (staged changes marked *)");
    println!("  /enable <name>             Stage enabling a tool");
    println!("  /disable <name>            Stage disabling a tool");
    println!("  /pending                   Show staged tool changes");
    println!("  /apply                     Apply all staged changes in one batch");
    println!("  /reload                    Discard staged changes, reload tools");
    println!("  /config                    Show runtime configuration");
    println!("  /config set <path> <json>  Edit one configuration field");
    println!("  /base <url>                Update base URL");
    println!("  /token <token>             Update bearer token");
}

pub fn tasks(tasks: &[Task], stats: Option<&TaskStats>) {
    if let Some(stats) = stats {
        println!(
            "{} total: {} pending, {} running, {} completed, {} failed",
            stats.total, stats.pending, stats.running, stats.completed, stats.failed
        );
    }
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for task in tasks {
        println!(
            "[{}] {} {} - {}",
            task.status, task.task_id, task.task_type, task.description
        );
    }
}

pub fn stats(stats: &TaskStats) {
    println!("tasks:");
    println!("  total: {}", stats.total);
    println!("  pending: {}", stats.pending);
    println!("  running: {}", stats.running);
    println!("  completed: {}", stats.completed);
    println!("  failed: {}", stats.failed);
}

pub fn detail(task: &Task) {
    println!("task {}", task.task_id);
    println!("  status: {}", task.status);
    println!("  type: {}  priority: {}", task.task_type, task.priority);
    if !task.description.is_empty() {
        println!("  description: {}", task.description);
    }
    println!("  created: {}  updated: {}", task.created_at, task.updated_at);
    if let Some(done) = task.completed_at {
        println!("  completed: {}", done);
    }
    if let Some(message) = &task.error_message {
        println!("  error: {}", message);
    }
    if let Some(summary) = task.execution_summary() {
        println!("  summary: {}", summary);
    }
    let steps = task.steps();
    if steps.is_empty() {
        return;
    }
    println!("  steps:");
    for step in steps {
        println!(
            "    {}. [{}] {} ({}, {:.0} ms)",
            step.step_number, step.status, step.description, step.step_type, step.duration_ms
        );
        for call in &step.tool_calls {
            if call.failed() {
                println!(
                    "       tool {} failed: {}",
                    call.tool_name,
                    call.error.as_deref().unwrap_or("unknown error")
                );
            } else {
                println!("       tool {} ok", call.tool_name);
            }
        }
    }
}

pub fn tools(tools: &[Tool], pending: &[PendingChange]) {
    if tools.is_empty() {
        println!("no tools");
        return;
    }
    for tool in tools {
        let staged = pending.iter().any(|change| change.tool_name == tool.name);
        println!(
            "{}{} [{}|{}] ({}{}) {}",
            if staged { "*" } else { " " },
            tool.name,
            if tool.enabled { "enabled" } else { "disabled" },
            if tool.active { "active" } else { "inactive" },
            tool.category,
            tool.version
                .as_deref()
                .map(|v| format!(" v{}", v))
                .unwrap_or_default(),
            tool.description
        );
    }
    if !pending.is_empty() {
        println!("{} staged change(s), /apply to persist", pending.len());
    }
}

pub fn pending(changes: &[PendingChange]) {
    if changes.is_empty() {
        println!("no pending changes");
        return;
    }
    for change in changes {
        println!("{}", change.wire_tag());
    }
}

pub fn config_value(config: &Value) {
    match serde_json::to_string_pretty(config) {
        Ok(pretty) => println!("{}", pretty),
        Err(_) => println!("{}", config),
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
