use std::time::Duration;

use agent_dash_rs::{
    ApiClient, ChangeIntent, DashConfig, FlushOutcome, PollHandle, TaskFilter, TaskMonitor,
    TaskStatus, ToolConsole,
};
use serde_json::Value;
use tokio::io::AsyncBufReadExt;

use crate::render;

pub struct Repl {
    config: DashConfig,
    client: ApiClient,
    monitor: TaskMonitor,
    tools: ToolConsole,
    poll: Option<PollHandle>,
    watch: Option<PollHandle>,
}

impl Repl {
    pub fn new(config: DashConfig) -> Self {
        let client = ApiClient::new(&config.base_url, config.token.clone());
        let monitor = TaskMonitor::new(client.clone(), config.task_limit);
        let tools = ToolConsole::new(client.clone());
        Self {
            config,
            client,
            monitor,
            tools,
            poll: None,
            watch: None,
        }
    }

    pub async fn run(&mut self) {
        render::banner(&self.config);
        match self.client.check_health().await {
            Ok(true) => {}
            Ok(false) => render::error("backend reachable but unhealthy"),
            Err(err) => render::error(&format!("backend not reachable: {}", err)),
        }

        self.monitor.open_list(TaskFilter::default());
        if let Err(err) = self.monitor.refresh_list().await {
            render::error(&err.to_string());
        }
        if let Err(err) = self.tools.reload().await {
            render::error(&err.to_string());
        }
        self.poll = Some(
            self.monitor
                .start_poll(Duration::from_secs(self.config.poll_secs)),
        );

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            render::prompt();
            let line = match lines.next_line().await {
                Ok(Some(line)) => line.trim().to_string(),
                _ => break,
            };
            if line.is_empty() {
                continue;
            }
            if !line.starts_with('/') {
                render::info("commands start with /, type /help");
                continue;
            }
            if self.handle_command(&line).await {
                break;
            }
        }
    }

    async fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "tasks" => self.show_tasks(rest).await,
            "stats" => {
                if let Err(err) = self.monitor.refresh_stats().await {
                    render::error(&err.to_string());
                }
                match self.monitor.stats() {
                    Some(stats) => render::stats(&stats),
                    None => render::info("no stats yet"),
                }
            }
            "task" => {
                if rest.is_empty() {
                    render::error("usage: /task <id>");
                } else {
                    self.show_detail(rest).await;
                }
            }
            "cancel" => {
                if rest.is_empty() {
                    render::error("usage: /cancel <id>");
                } else {
                    match self.monitor.cancel(rest).await {
                        Ok(()) => {
                            render::info("cancel requested");
                            if let Some(task) = self.monitor.detail() {
                                render::detail(&task);
                            }
                        }
                        Err(err) => render::error(&err.to_string()),
                    }
                }
            }
            "delete" => {
                if rest.is_empty() {
                    render::error("usage: /delete <id>");
                } else {
                    match self.monitor.delete(rest).await {
                        Ok(()) => render::info("task deleted"),
                        Err(err) => render::error(&err.to_string()),
                    }
                }
            }
            "watch" => self.toggle_watch(rest),
            "tools" => render::tools(&self.tools.display(), self.tools.pending()),
            "enable" => self.stage_change(rest, ChangeIntent::Enable),
            "disable" => self.stage_change(rest, ChangeIntent::Disable),
            "pending" => render::pending(self.tools.pending()),
            "apply" => match self.tools.flush().await {
                Ok(FlushOutcome::Nothing) => render::info("no pending changes"),
                Ok(FlushOutcome::Applied(count)) => {
                    render::info(&format!("applied {} change(s), tool list reloaded", count))
                }
                Err(err) => {
                    // buffer kept; the operator can retry /apply
                    render::error(&err.to_string());
                }
            },
            "reload" => match self.tools.reload().await {
                Ok(()) => render::info("tool list reloaded, staged changes discarded"),
                Err(err) => render::error(&err.to_string()),
            },
            "config" => self.config_command(rest).await,
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    self.config.base_url = rest.to_string();
                    self.rebuild().await;
                    render::info("base url updated");
                }
            }
            "token" => {
                if rest.is_empty() {
                    render::info(&format!("token set: {}", self.config.token.is_some()));
                } else {
                    self.config.token = Some(rest.to_string());
                    self.rebuild().await;
                    render::info("token updated");
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    async fn show_tasks(&mut self, rest: &str) {
        let mut tokens: Vec<&str> = rest.split_whitespace().collect();
        let status = tokens.first().and_then(|first| TaskStatus::parse(first));
        if status.is_some() {
            tokens.remove(0);
        }
        let query = if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" "))
        };

        self.monitor.open_list(TaskFilter { status, query });
        if let Err(err) = self.monitor.refresh_list().await {
            render::error(&err.to_string());
        }
        if let Err(err) = self.monitor.refresh_stats().await {
            render::error(&err.to_string());
        }
        render::tasks(&self.monitor.visible_tasks(), self.monitor.stats().as_ref());
    }

    async fn show_detail(&mut self, task_id: &str) {
        self.monitor.open_detail(task_id);
        match self.monitor.refresh_detail().await {
            Ok(()) => match self.monitor.detail() {
                Some(task) => render::detail(&task),
                None => render::info("no detail yet"),
            },
            Err(err) if err.is_not_found() => {
                render::error(&format!("task not found: {}", task_id));
            }
            Err(err) => render::error(&err.to_string()),
        }
    }

    fn stage_change(&mut self, rest: &str, intent: ChangeIntent) {
        if rest.is_empty() {
            render::error(&format!("usage: /{} <name>", intent.as_str()));
            return;
        }
        self.tools.stage(rest, intent);
        render::info(&format!(
            "staged {}:{} ({} pending)",
            intent.as_str(),
            rest,
            self.tools.pending().len()
        ));
    }

    fn toggle_watch(&mut self, rest: &str) {
        let turn_on = if rest.is_empty() {
            self.watch.is_none()
        } else {
            match parse_on_off(rest) {
                Some(flag) => flag,
                None => {
                    render::error("invalid watch flag");
                    return;
                }
            }
        };
        if turn_on {
            if self.watch.is_none() {
                self.watch = Some(
                    self.monitor
                        .start_auto_refresh(Duration::from_secs(self.config.poll_secs)),
                );
            }
            render::info("auto-refresh on; /tasks shows the latest snapshot");
        } else {
            if let Some(watch) = self.watch.take() {
                watch.stop();
            }
            render::info("auto-refresh off");
        }
    }

    async fn config_command(&mut self, rest: &str) {
        if rest.is_empty() {
            match self.client.get_config().await {
                Ok(config) => render::config_value(&config),
                Err(err) => render::error(&err.to_string()),
            }
            return;
        }
        let Some(args) = rest.strip_prefix("set ") else {
            render::error("usage: /config [set <dotted.path> <json>]");
            return;
        };
        let mut parts = args.trim().splitn(2, ' ');
        let path = parts.next().unwrap_or("").trim();
        let raw = parts.next().unwrap_or("").trim();
        if path.is_empty() || raw.is_empty() {
            render::error("usage: /config set <dotted.path> <json>");
            return;
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        match self.client.get_config().await {
            Ok(mut config) => match set_json_path(&mut config, path, value) {
                Ok(()) => match self.client.put_config(&config).await {
                    Ok(()) => render::info("config updated"),
                    Err(err) => render::error(&err.to_string()),
                },
                Err(err) => render::error(&err),
            },
            Err(err) => render::error(&err.to_string()),
        }
    }

    /// Rebuilds the client and both subsystems after a base-url or token
    /// change. Old timers are stopped first so no tick of the previous
    /// backend can land in the new state.
    async fn rebuild(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.stop();
        }
        if let Some(watch) = self.watch.take() {
            watch.stop();
        }
        self.monitor.close();
        self.client = ApiClient::new(&self.config.base_url, self.config.token.clone());
        self.monitor = TaskMonitor::new(self.client.clone(), self.config.task_limit);
        self.tools = ToolConsole::new(self.client.clone());
        self.monitor.open_list(TaskFilter::default());
        if let Err(err) = self.monitor.refresh_list().await {
            render::error(&err.to_string());
        }
        if let Err(err) = self.tools.reload().await {
            render::error(&err.to_string());
        }
        self.poll = Some(
            self.monitor
                .start_poll(Duration::from_secs(self.config.poll_secs)),
        );
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn set_json_path(root: &mut Value, path: &str, new_value: Value) -> Result<(), String> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err("empty config path".to_string());
    }
    let mut current = root;
    for segment in &segments[..segments.len() - 1] {
        let map = current
            .as_object_mut()
            .ok_or_else(|| format!("{} is not an object", segment))?;
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    let last = segments[segments.len() - 1];
    let map = current
        .as_object_mut()
        .ok_or_else(|| format!("{} is not an object", last))?;
    map.insert(last.to_string(), new_value);
    Ok(())
}
