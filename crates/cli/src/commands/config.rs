use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use showroom_core::config::AppConfig;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entries = effective_entries(&config, config_file_doc.as_ref(), config_file_path.as_deref());

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        serde_json::to_value(entries).ok(),
    )
}

fn effective_entries(
    config: &AppConfig,
    doc: Option<&Value>,
    path: Option<&Path>,
) -> Vec<ConfigEntry> {
    let rows: [(&'static str, &[&str], String); 13] = [
        ("database.url", &["SHOWROOM_DATABASE_URL"], config.database.url.clone()),
        (
            "database.max_connections",
            &["SHOWROOM_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        (
            "database.timeout_secs",
            &["SHOWROOM_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        (
            "server.bind_address",
            &["SHOWROOM_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        ("server.port", &["SHOWROOM_SERVER_PORT"], config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            &["SHOWROOM_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        (
            "calendar.days_ahead",
            &["SHOWROOM_CALENDAR_DAYS_AHEAD"],
            config.calendar.days_ahead.to_string(),
        ),
        (
            "calendar.start_hour",
            &["SHOWROOM_CALENDAR_START_HOUR"],
            config.calendar.start_hour.to_string(),
        ),
        (
            "calendar.end_hour",
            &["SHOWROOM_CALENDAR_END_HOUR"],
            config.calendar.end_hour.to_string(),
        ),
        (
            "ledger.commit_timeout_ms",
            &["SHOWROOM_LEDGER_COMMIT_TIMEOUT_MS"],
            config.ledger.commit_timeout_ms.to_string(),
        ),
        (
            "logging.level",
            &["SHOWROOM_LOGGING_LEVEL", "SHOWROOM_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        (
            "logging.format",
            &["SHOWROOM_LOGGING_FORMAT", "SHOWROOM_LOG_FORMAT"],
            config.logging.format.as_str().to_string(),
        ),
        (
            "config.file",
            &[],
            path.map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string()),
        ),
    ];

    rows.into_iter()
        .map(|(key, env_keys, value)| ConfigEntry {
            key,
            value,
            source: field_source(key, env_keys, doc, path),
        })
        .collect()
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("showroom.toml"), PathBuf::from("config/showroom.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
