use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use agent_dash_rs::{
    ApiClient, ChangeIntent, DashError, FlushOutcome, MonitorView, TaskFilter, TaskMonitor,
    TaskStatus, ToolConsole,
};

#[derive(Default)]
struct Backend {
    tasks: Vec<Value>,
    tools: Vec<Value>,
    config: Value,
    list_requests: Vec<String>,
    detail_hits: HashMap<String, usize>,
    flush_bodies: Vec<Value>,
    fail_tasks: bool,
    fail_flush: bool,
    detail_delay: Option<(String, Duration)>,
}

type Shared = Arc<Mutex<Backend>>;

fn task_json(id: &str, status: &str, task_type: &str, description: &str) -> Value {
    json!({
        "task_id": id,
        "status": status,
        "task_type": task_type,
        "priority": 4,
        "description": description,
        "parameters": {},
        "result": null,
        "created_at": "2026-08-29T10:00:00Z",
        "updated_at": "2026-08-29T10:00:00Z",
        "completed_at": if status == "completed" || status == "failed" {
            json!("2026-08-29T10:01:00Z")
        } else {
            Value::Null
        }
    })
}

fn tool_json(name: &str, enabled: bool) -> Value {
    json!({
        "name": name,
        "description": format!("{} tool", name),
        "category": "general",
        "version": "1.0",
        "enabled": enabled,
        "active": enabled
    })
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_tasks(
    State(state): State<Shared>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().unwrap();
    backend.list_requests.push(uri.to_string());
    if backend.fail_tasks {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "task store exploded"})),
        );
    }
    let status = params.get("status").cloned();
    let tasks: Vec<Value> = backend
        .tasks
        .iter()
        .filter(|task| match &status {
            Some(wanted) => task.get("status").and_then(Value::as_str) == Some(wanted.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    (
        StatusCode::OK,
        Json(json!({"status": "success", "tasks": tasks})),
    )
}

async fn task_stats(State(state): State<Shared>) -> Json<Value> {
    let backend = state.lock().unwrap();
    let count = |wanted: &str| {
        backend
            .tasks
            .iter()
            .filter(|task| task.get("status").and_then(Value::as_str) == Some(wanted))
            .count()
    };
    Json(json!({
        "status": "success",
        "stats": {
            "total": backend.tasks.len(),
            "pending": count("pending"),
            "running": count("running"),
            "completed": count("completed"),
            "failed": count("failed"),
        }
    }))
}

async fn get_task(State(state): State<Shared>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    let delay = {
        let mut backend = state.lock().unwrap();
        *backend.detail_hits.entry(id.clone()).or_default() += 1;
        match &backend.detail_delay {
            Some((delayed_id, delay)) if *delayed_id == id => Some(*delay),
            _ => None,
        }
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let backend = state.lock().unwrap();
    match backend
        .tasks
        .iter()
        .find(|task| task.get("task_id").and_then(Value::as_str) == Some(id.as_str()))
    {
        Some(task) => (
            StatusCode::OK,
            Json(json!({"status": "success", "task": task})),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Task not found"})),
        ),
    }
}

async fn cancel_task(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().unwrap();
    let task = backend
        .tasks
        .iter_mut()
        .find(|task| task.get("task_id").and_then(Value::as_str) == Some(id.as_str()));
    match task {
        Some(task) if task.get("status").and_then(Value::as_str) == Some("running") => {
            task["status"] = json!("failed");
            task["error_message"] = json!("Task cancelled");
            task["completed_at"] = json!("2026-08-29T10:02:00Z");
            (
                StatusCode::OK,
                Json(json!({"status": "success", "message": "Task cancelled successfully"})),
            )
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Task not found or cannot be cancelled"})),
        ),
    }
}

async fn delete_task(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().unwrap();
    let before = backend.tasks.len();
    backend
        .tasks
        .retain(|task| task.get("task_id").and_then(Value::as_str) != Some(id.as_str()));
    if backend.tasks.len() < before {
        (
            StatusCode::OK,
            Json(json!({"status": "success", "message": "Task deleted"})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Task not found"})),
        )
    }
}

async fn list_tools(State(state): State<Shared>) -> Json<Value> {
    let backend = state.lock().unwrap();
    Json(json!({"status": "success", "tools": backend.tools}))
}

async fn save_and_reload(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().unwrap();
    backend.flush_bodies.push(body.clone());
    if backend.fail_flush {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "tool reload failed"})),
        );
    }
    let changes: Vec<String> = body
        .get("changes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    for change in changes {
        let Some((action, name)) = change.split_once(':') else {
            continue;
        };
        let on = action == "enable";
        for tool in backend.tools.iter_mut() {
            if tool.get("name").and_then(Value::as_str) == Some(name) {
                tool["enabled"] = json!(on);
                tool["active"] = json!(on);
            }
        }
    }
    (
        StatusCode::OK,
        Json(json!({"status": "success", "message": "Tools saved and reloaded successfully"})),
    )
}

async fn get_config(State(state): State<Shared>) -> Json<Value> {
    Json(state.lock().unwrap().config.clone())
}

async fn put_config(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().config = body;
    Json(json!({"status": "success"}))
}

async fn spawn_backend(state: Shared) -> String {
    let app = Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks))
        .route("/tasks/stats", get(task_stats))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/cancel", post(cancel_task))
        .route("/tasks/:id/delete", delete(delete_task))
        .route("/tools", get(list_tools))
        .route("/tools/save-and-reload", post(save_and_reload))
        .route("/config", get(get_config).put(put_config))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    listener.set_nonblocking(true).expect("nonblocking");
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .expect("from_tcp")
            .serve(app.into_make_service())
            .await
            .expect("serve");
    });
    format!("http://{}", addr)
}

fn shared(tasks: Vec<Value>, tools: Vec<Value>) -> Shared {
    Arc::new(Mutex::new(Backend {
        tasks,
        tools,
        config: json!({"llm": {"provider": "gemini", "temperature": 0.3}}),
        ..Backend::default()
    }))
}

#[tokio::test]
async fn status_filter_goes_to_server_text_query_stays_local() {
    let backend = shared(
        vec![
            task_json("t1", "running", "research", "fetch rust docs"),
            task_json("t2", "running", "summarize", "condense meeting notes"),
            task_json("t3", "completed", "research", "rust changelog"),
        ],
        vec![],
    );
    let base = spawn_backend(backend.clone()).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_list(TaskFilter {
        status: Some(TaskStatus::Running),
        query: Some("rust".to_string()),
    });
    monitor.refresh_list().await.expect("refresh");

    let visible = monitor.visible_tasks();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].task_id, "t1");

    let requests = backend.lock().unwrap().list_requests.clone();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("status=running"));
    assert!(!requests[0].contains("rust"));
}

#[tokio::test]
async fn failed_list_refresh_keeps_previous_snapshot() {
    let backend = shared(
        vec![
            task_json("t1", "running", "research", "one"),
            task_json("t2", "pending", "research", "two"),
        ],
        vec![],
    );
    let base = spawn_backend(backend.clone()).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_list(TaskFilter::default());
    monitor.refresh_list().await.expect("first refresh");
    assert_eq!(monitor.visible_tasks().len(), 2);

    backend.lock().unwrap().fail_tasks = true;
    let err = monitor.refresh_list().await.expect_err("should fail");
    match err {
        DashError::Http { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "task store exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(monitor.visible_tasks().len(), 2);
}

#[tokio::test]
async fn missing_task_is_not_found_not_a_transport_error() {
    let backend = shared(vec![], vec![]);
    let base = spawn_backend(backend).await;
    let client = ApiClient::new(&base, None);

    let err = client.get_task("nope").await.expect_err("missing");
    assert!(err.is_not_found());

    let monitor = TaskMonitor::new(client, 50);
    monitor.open_detail("nope");
    let err = monitor.refresh_detail().await.expect_err("missing");
    assert!(err.is_not_found());
    assert!(monitor.detail().is_none());
}

#[tokio::test]
async fn poll_stops_refetching_after_terminal_status() {
    let backend = shared(
        vec![task_json("t1", "running", "research", "long running job")],
        vec![],
    );
    let base = spawn_backend(backend.clone()).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_detail("t1");
    let _poll = monitor.start_poll(Duration::from_millis(40));

    tokio::time::sleep(Duration::from_millis(180)).await;
    let while_running = backend.lock().unwrap().detail_hits["t1"];
    assert!(while_running >= 2, "expected repeated polls, got {while_running}");

    {
        let mut backend = backend.lock().unwrap();
        backend.tasks[0]["status"] = json!("completed");
        backend.tasks[0]["completed_at"] = json!("2026-08-29T10:03:00Z");
    }

    // let the loop observe the terminal status, then verify it goes quiet
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_flip = backend.lock().unwrap().detail_hits["t1"];
    tokio::time::sleep(Duration::from_millis(250)).await;
    let settled = backend.lock().unwrap().detail_hits["t1"];

    assert_eq!(after_flip, settled, "completed task must not be re-fetched");
    assert_eq!(
        monitor.detail().expect("detail").status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn stale_detail_response_does_not_clobber_new_view() {
    let backend = shared(
        vec![
            task_json("a", "running", "research", "slow one"),
            task_json("b", "running", "research", "fast one"),
        ],
        vec![],
    );
    backend.lock().unwrap().detail_delay = Some(("a".to_string(), Duration::from_millis(300)));
    let base = spawn_backend(backend).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_detail("a");
    let in_flight = {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let _ = monitor.refresh_detail().await;
        })
    };
    // give the slow fetch time to capture its generation and hit the wire
    tokio::time::sleep(Duration::from_millis(50)).await;

    monitor.open_detail("b");
    monitor.refresh_detail().await.expect("detail b");
    in_flight.await.expect("join");

    assert_eq!(monitor.detail().expect("detail").task_id, "b");
}

#[tokio::test]
async fn cancel_refetches_instead_of_flipping_locally() {
    let backend = shared(
        vec![
            task_json("t1", "running", "research", "to cancel"),
            task_json("t2", "completed", "research", "already done"),
        ],
        vec![],
    );
    let base = spawn_backend(backend).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_list(TaskFilter::default());
    monitor.refresh_list().await.expect("list");

    let err = monitor.cancel("t2").await.expect_err("not running");
    assert!(matches!(err, DashError::Api(_)));

    monitor.open_detail("t1");
    monitor.refresh_detail().await.expect("detail");
    monitor.cancel("t1").await.expect("cancel");

    let detail = monitor.detail().expect("detail");
    assert_eq!(detail.status, TaskStatus::Failed);
    assert_eq!(detail.error_message.as_deref(), Some("Task cancelled"));
}

#[tokio::test]
async fn delete_removes_task_and_navigates_away() {
    let backend = shared(
        vec![
            task_json("t1", "completed", "research", "done"),
            task_json("t2", "running", "research", "busy"),
        ],
        vec![],
    );
    let base = spawn_backend(backend).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_list(TaskFilter::default());
    monitor.refresh_list().await.expect("list");

    let err = monitor.delete("t2").await.expect_err("still running");
    assert!(matches!(err, DashError::Api(_)));

    monitor.open_detail("t1");
    monitor.refresh_detail().await.expect("detail");
    monitor.delete("t1").await.expect("delete");

    assert_eq!(monitor.view(), Some(MonitorView::List));
    assert!(monitor.detail().is_none());
    assert!(monitor.visible_tasks().iter().all(|t| t.task_id != "t1"));
}

#[tokio::test]
async fn flush_sends_batch_clears_buffer_and_reloads() {
    let backend = shared(vec![], vec![tool_json("search", false), tool_json("fetch", true)]);
    let base = spawn_backend(backend.clone()).await;
    let mut console = ToolConsole::new(ApiClient::new(&base, None));

    console.reload().await.expect("initial load");
    console.stage("search", ChangeIntent::Enable);
    console.stage("fetch", ChangeIntent::Disable);

    let outcome = console.flush().await.expect("flush");
    assert_eq!(outcome, FlushOutcome::Applied(2));
    assert!(console.pending().is_empty());

    let bodies = backend.lock().unwrap().flush_bodies.clone();
    assert_eq!(bodies.len(), 1);
    let mut sent: Vec<String> = bodies[0]["changes"]
        .as_array()
        .expect("changes array")
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    sent.sort();
    assert_eq!(sent, vec!["disable:fetch", "enable:search"]);

    let shown = console.display();
    let search = shown.iter().find(|t| t.name == "search").expect("search");
    let fetch = shown.iter().find(|t| t.name == "fetch").expect("fetch");
    assert!(search.enabled && search.active);
    assert!(!fetch.enabled && !fetch.active);
}

#[tokio::test]
async fn failed_flush_leaves_buffer_and_ground_truth_intact() {
    let backend = shared(vec![], vec![tool_json("search", false)]);
    backend.lock().unwrap().fail_flush = true;
    let base = spawn_backend(backend).await;
    let mut console = ToolConsole::new(ApiClient::new(&base, None));

    console.reload().await.expect("initial load");
    console.stage("search", ChangeIntent::Enable);

    let err = console.flush().await.expect_err("flush fails");
    match err {
        DashError::Http { status, message } => {
            assert_eq!(status, 500);
            // failure message arrives under the `detail` key
            assert_eq!(message, "tool reload failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(console.pending().len(), 1);

    console.reload().await.expect("reload");
    let search = console
        .display()
        .into_iter()
        .find(|t| t.name == "search")
        .expect("search");
    assert!(!search.enabled, "no partial application may be assumed");
}

#[tokio::test]
async fn reload_is_idempotent_and_discards_staging() {
    let backend = shared(vec![], vec![tool_json("search", false), tool_json("fetch", true)]);
    let base = spawn_backend(backend).await;
    let mut console = ToolConsole::new(ApiClient::new(&base, None));

    console.reload().await.expect("reload");
    let first = console.display();
    console.reload().await.expect("reload again");
    assert_eq!(first, console.display());

    console.stage("search", ChangeIntent::Enable);
    console.reload().await.expect("reload discards");
    assert!(console.pending().is_empty());
    let search = console
        .display()
        .into_iter()
        .find(|t| t.name == "search")
        .expect("search");
    assert!(!search.enabled);
}

#[tokio::test]
async fn empty_flush_is_a_noop() {
    let backend = shared(vec![], vec![tool_json("search", false)]);
    let base = spawn_backend(backend.clone()).await;
    let mut console = ToolConsole::new(ApiClient::new(&base, None));

    console.reload().await.expect("reload");
    let outcome = console.flush().await.expect("flush");
    assert_eq!(outcome, FlushOutcome::Nothing);
    assert!(backend.lock().unwrap().flush_bodies.is_empty());
}

#[tokio::test]
async fn auto_refresh_only_drives_the_list_view_and_stops_cleanly() {
    let backend = shared(vec![task_json("t1", "running", "research", "job")], vec![]);
    let base = spawn_backend(backend.clone()).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_detail("t1");
    let handle = monitor.start_auto_refresh(Duration::from_millis(40));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(backend.lock().unwrap().list_requests.is_empty());

    monitor.open_list(TaskFilter::default());
    tokio::time::sleep(Duration::from_millis(150)).await;
    let while_open = backend.lock().unwrap().list_requests.len();
    assert!(while_open >= 2, "expected refreshes, got {while_open}");

    handle.stop();
    // let anything already in flight land, then verify the loop is silent
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_stop = backend.lock().unwrap().list_requests.len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.lock().unwrap().list_requests.len(), after_stop);
}

#[tokio::test]
async fn stats_refresh_is_independent_of_the_list() {
    let backend = shared(
        vec![
            task_json("t1", "running", "research", "one"),
            task_json("t2", "failed", "research", "two"),
        ],
        vec![],
    );
    let base = spawn_backend(backend).await;
    let monitor = TaskMonitor::new(ApiClient::new(&base, None), 50);

    monitor.open_list(TaskFilter {
        status: Some(TaskStatus::Running),
        query: None,
    });
    monitor.refresh_list().await.expect("list");
    monitor.refresh_stats().await.expect("stats");

    // the filtered list and the global stats legitimately disagree
    assert_eq!(monitor.visible_tasks().len(), 1);
    let stats = monitor.stats().expect("stats");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn config_round_trips_verbatim_except_edits() {
    let backend = shared(vec![], vec![]);
    let base = spawn_backend(backend).await;
    let client = ApiClient::new(&base, None);

    let mut config = client.get_config().await.expect("get");
    assert_eq!(config["llm"]["provider"], json!("gemini"));

    config["llm"]["temperature"] = json!(0.7);
    client.put_config(&config).await.expect("put");

    let round_tripped = client.get_config().await.expect("get again");
    assert_eq!(round_tripped, config);
}
