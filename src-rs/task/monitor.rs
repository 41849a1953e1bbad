use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::result::{DashError, DashResult};

use super::types::{Task, TaskStats, TaskStatus};

/// Server-side status filter plus a client-side free-text query. The status
/// goes on the wire; the query never does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub query: Option<String>,
}

/// The view the monitor is currently driving. There is exactly one setter
/// path (`open_list` / `open_detail` / `close`), and every change bumps the
/// generation counter, which is what invalidates in-flight responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorView {
    List,
    Detail { task_id: String },
}

#[derive(Default)]
struct MonitorState {
    generation: u64,
    view: Option<MonitorView>,
    filter: TaskFilter,
    tasks: Vec<Task>,
    stats: Option<TaskStats>,
    detail: Option<Task>,
}

/// Keeps a locally consistent view of the task collection and of one task's
/// detail. The backend is the sole source of truth and offers no push
/// channel, so freshness comes from polling; consistency comes from
/// replacing snapshots wholesale and from dropping any response whose
/// generation no longer matches. No status transition is ever inferred
/// locally.
#[derive(Clone)]
pub struct TaskMonitor {
    client: ApiClient,
    limit: usize,
    state: Arc<Mutex<MonitorState>>,
}

impl TaskMonitor {
    pub fn new(client: ApiClient, limit: usize) -> Self {
        Self {
            client,
            limit,
            state: Arc::new(Mutex::new(MonitorState::default())),
        }
    }

    pub fn open_list(&self, filter: TaskFilter) {
        if let Ok(mut state) = self.state.lock() {
            state.generation += 1;
            state.view = Some(MonitorView::List);
            state.filter = filter;
            state.detail = None;
        }
    }

    pub fn open_detail(&self, task_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.generation += 1;
            state.view = Some(MonitorView::Detail {
                task_id: task_id.to_string(),
            });
            state.detail = None;
        }
    }

    /// Tears the current view down. Responses still in flight for it will
    /// arrive to a newer generation and be dropped.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.generation += 1;
            state.view = None;
            state.detail = None;
        }
    }

    pub fn view(&self) -> Option<MonitorView> {
        self.state.lock().ok().and_then(|state| state.view.clone())
    }

    pub fn filter(&self) -> TaskFilter {
        self.state
            .lock()
            .map(|state| state.filter.clone())
            .unwrap_or_default()
    }

    /// Last list snapshot with the free-text query applied. Ordering is the
    /// backend's, unmodified.
    pub fn visible_tasks(&self) -> Vec<Task> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        match state.filter.query.as_deref() {
            Some(query) if !query.trim().is_empty() => filter_tasks(&state.tasks, query),
            _ => state.tasks.clone(),
        }
    }

    pub fn stats(&self) -> Option<TaskStats> {
        self.state.lock().ok().and_then(|state| state.stats)
    }

    pub fn detail(&self) -> Option<Task> {
        self.state.lock().ok().and_then(|state| state.detail.clone())
    }

    /// Re-fetches the list for the current status filter. On failure the
    /// previous snapshot stays in place and the error is the caller's
    /// notice. A response that outlived its view is dropped silently.
    pub async fn refresh_list(&self) -> DashResult<()> {
        let (generation, status) = {
            let Ok(state) = self.state.lock() else {
                return Ok(());
            };
            (state.generation, state.filter.status)
        };
        let tasks = self.client.list_tasks(status, self.limit).await?;
        if let Ok(mut state) = self.state.lock() {
            if state.generation != generation {
                debug!("dropping stale task list response");
                return Ok(());
            }
            state.tasks = tasks;
        }
        Ok(())
    }

    /// Stats are fetched independently of the list, so the two can
    /// transiently disagree; that is accepted, not reconciled.
    pub async fn refresh_stats(&self) -> DashResult<()> {
        let generation = {
            let Ok(state) = self.state.lock() else {
                return Ok(());
            };
            state.generation
        };
        let stats = self.client.task_stats().await?;
        if let Ok(mut state) = self.state.lock() {
            if state.generation != generation {
                debug!("dropping stale stats response");
                return Ok(());
            }
            state.stats = Some(stats);
        }
        Ok(())
    }

    /// Re-fetches the open detail, if any. A NotFound from the backend
    /// propagates distinctly from transport failures.
    pub async fn refresh_detail(&self) -> DashResult<()> {
        let (generation, task_id) = {
            let Ok(state) = self.state.lock() else {
                return Ok(());
            };
            match &state.view {
                Some(MonitorView::Detail { task_id }) => (state.generation, task_id.clone()),
                _ => return Ok(()),
            }
        };
        let task = self.client.get_task(&task_id).await?;
        if let Ok(mut state) = self.state.lock() {
            if state.generation != generation {
                debug!(task_id = %task_id, "dropping stale detail response");
                return Ok(());
            }
            state.detail = Some(task);
        }
        Ok(())
    }

    /// Cancels a running task. There is no optimistic status flip: on
    /// success the task is re-fetched so the display only ever shows what
    /// the backend said last.
    pub async fn cancel(&self, task_id: &str) -> DashResult<()> {
        match self.last_known_status(task_id) {
            Some(TaskStatus::Running) => {}
            Some(status) => {
                return Err(DashError::Api(format!(
                    "task {} is {}, only running tasks can be cancelled",
                    task_id, status
                )))
            }
            None => {
                return Err(DashError::NotFound(format!("task {} not tracked", task_id)))
            }
        }
        let generation = self.generation();
        self.client.cancel_task(task_id).await?;
        let task = self.client.get_task(task_id).await?;
        self.apply_task(generation, task);
        Ok(())
    }

    /// Deletes a terminal task. On success it leaves the visible set, and a
    /// detail view open on it navigates back to the list.
    pub async fn delete(&self, task_id: &str) -> DashResult<()> {
        match self.last_known_status(task_id) {
            Some(status) if status.is_terminal() => {}
            Some(status) => {
                return Err(DashError::Api(format!(
                    "task {} is {}, only completed or failed tasks can be deleted",
                    task_id, status
                )))
            }
            None => {
                return Err(DashError::NotFound(format!("task {} not tracked", task_id)))
            }
        }
        self.client.delete_task(task_id).await?;
        if let Ok(mut state) = self.state.lock() {
            state.tasks.retain(|task| task.task_id != task_id);
            let open_here = matches!(
                &state.view,
                Some(MonitorView::Detail { task_id: open }) if open == task_id
            );
            if open_here {
                state.generation += 1;
                state.view = Some(MonitorView::List);
                state.detail = None;
            }
        }
        Ok(())
    }

    /// The view-driven poll loop: on each tick, refresh whatever the
    /// current view needs. A detail view is re-fetched only while its
    /// last-known status is running. Ticks may overlap in-flight fetches;
    /// the generation guard makes the last resolved response win. A failed
    /// tick is logged and never stops the timer.
    pub fn start_poll(&self, period: Duration) -> PollHandle {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                monitor.tick().await;
            }
        });
        PollHandle { handle }
    }

    /// The list-only auto-refresh variant, independently start/stoppable by
    /// the operator. Same idempotence rule as the main loop.
    pub fn start_auto_refresh(&self, period: Duration) -> PollHandle {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                if !matches!(monitor.view(), Some(MonitorView::List)) {
                    continue;
                }
                if let Err(err) = monitor.refresh_list().await {
                    warn!(error = %err, "auto-refresh tick failed");
                }
            }
        });
        PollHandle { handle }
    }

    async fn tick(&self) {
        enum Target {
            List,
            Detail,
        }
        let target = {
            let Ok(state) = self.state.lock() else {
                return;
            };
            match &state.view {
                Some(MonitorView::List) => Some(Target::List),
                Some(MonitorView::Detail { .. }) => {
                    // refetch until the first snapshot lands, then only
                    // while the last-known status is running
                    match &state.detail {
                        None => Some(Target::Detail),
                        Some(task) if task.status == TaskStatus::Running => Some(Target::Detail),
                        Some(_) => None,
                    }
                }
                None => None,
            }
        };
        let result = match target {
            Some(Target::List) => {
                let lists = self.refresh_list().await;
                let stats = self.refresh_stats().await;
                lists.and(stats)
            }
            Some(Target::Detail) => self.refresh_detail().await,
            None => Ok(()),
        };
        if let Err(err) = result {
            warn!(error = %err, "poll tick failed");
        }
    }

    fn generation(&self) -> u64 {
        self.state.lock().map(|state| state.generation).unwrap_or(0)
    }

    fn apply_task(&self, generation: u64, task: Task) {
        if let Ok(mut state) = self.state.lock() {
            if state.generation != generation {
                debug!(task_id = %task.task_id, "dropping stale task response");
                return;
            }
            if let Some(slot) = state
                .tasks
                .iter_mut()
                .find(|entry| entry.task_id == task.task_id)
            {
                *slot = task.clone();
            }
            let open_here = matches!(
                &state.view,
                Some(MonitorView::Detail { task_id }) if *task_id == task.task_id
            );
            if open_here {
                state.detail = Some(task);
            }
        }
    }

    fn last_known_status(&self, task_id: &str) -> Option<TaskStatus> {
        let state = self.state.lock().ok()?;
        if let Some(task) = &state.detail {
            if task.task_id == task_id {
                return Some(task.status);
            }
        }
        state
            .tasks
            .iter()
            .find(|task| task.task_id == task_id)
            .map(|task| task.status)
    }
}

/// Abortable handle to a polling loop. Stopping (or dropping) aborts the
/// timer synchronously; a fetch the loop already issued resolves into a
/// stale generation and is discarded.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Case-insensitive substring match over description, task type and id.
pub fn filter_tasks(tasks: &[Task], query: &str) -> Vec<Task> {
    let needle = query.trim().to_lowercase();
    tasks
        .iter()
        .filter(|task| {
            task.description.to_lowercase().contains(&needle)
                || task.task_type.to_lowercase().contains(&needle)
                || task.task_id.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
