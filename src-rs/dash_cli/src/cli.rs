use std::env;

use agent_dash_rs::DashConfig;

pub fn parse_config() -> DashConfig {
    let defaults = DashConfig::default();
    let mut cfg = DashConfig {
        base_url: env_or("AGENT_DASH_URL", defaults.base_url),
        token: env_opt("AGENT_DASH_TOKEN"),
        poll_secs: env_u64("AGENT_DASH_POLL_SECS", defaults.poll_secs),
        task_limit: env_usize("AGENT_DASH_LIMIT", defaults.task_limit),
        debug: env_bool("AGENT_DASH_DEBUG", defaults.debug),
    };

    let args: Vec<String> = env::args().collect();
    let mut idx = 1;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.base_url = value.clone();
                    idx += 1;
                }
            }
            "--token" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.token = Some(value.clone());
                    idx += 1;
                }
            }
            "--poll" => {
                if let Some(value) = args.get(idx + 1) {
                    if let Ok(parsed) = value.parse::<u64>() {
                        cfg.poll_secs = parsed.max(1);
                    }
                    idx += 1;
                }
            }
            "--limit" => {
                if let Some(value) = args.get(idx + 1) {
                    if let Ok(parsed) = value.parse::<usize>() {
                        cfg.task_limit = parsed;
                    }
                    idx += 1;
                }
            }
            "--debug" => {
                if let Some(value) = args.get(idx + 1) {
                    if value.starts_with('-') {
                        cfg.debug = true;
                    } else if let Ok(parsed) = value.parse::<bool>() {
                        cfg.debug = parsed;
                        idx += 1;
                    } else {
                        cfg.debug = true;
                    }
                } else {
                    cfg.debug = true;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    cfg
}

fn env_or(key: &str, fallback: String) -> String {
    env::var(key).unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_bool(key: &str, fallback: bool) -> bool {
    match env::var(key) {
        Ok(value) => value.parse::<bool>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_u64(key: &str, fallback: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.parse::<u64>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_usize(key: &str, fallback: usize) -> usize {
    match env::var(key) {
        Ok(value) => value.parse::<usize>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}
