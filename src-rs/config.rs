#[derive(Clone, Debug)]
pub struct DashConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub poll_secs: u64,
    pub task_limit: usize,
    pub debug: bool,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            poll_secs: 3,
            task_limit: 50,
            debug: false,
        }
    }
}
