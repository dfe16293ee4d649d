use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pozinox_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "POZINOX_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "POZINOX_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "POZINOX_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "POZINOX_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "POZINOX_SERVER_PORT"),
    ));
    lines.push(render_line(
        "server.public_base_url",
        &config.server.public_base_url,
        source("server.public_base_url", "POZINOX_SERVER_PUBLIC_BASE_URL"),
    ));

    lines.push(render_line(
        "storage.backend",
        &format!("{:?}", config.storage.backend),
        source("storage.backend", "POZINOX_STORAGE_BACKEND"),
    ));
    lines.push(render_line(
        "storage.bucket",
        &config.storage.bucket,
        source("storage.bucket", "POZINOX_STORAGE_BUCKET"),
    ));
    lines.push(render_line(
        "storage.local_root",
        &config.storage.local_root.display().to_string(),
        source("storage.local_root", "POZINOX_STORAGE_LOCAL_ROOT"),
    ));
    lines.push(render_line(
        "storage.supabase_url",
        config.storage.supabase_url.as_deref().unwrap_or("<unset>"),
        source("storage.supabase_url", "POZINOX_SUPABASE_URL"),
    ));
    let supabase_key = if config.storage.supabase_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "storage.supabase_key",
        supabase_key,
        source("storage.supabase_key", "POZINOX_SUPABASE_KEY"),
    ));
    lines.push(render_line(
        "storage.request_timeout_secs",
        &config.storage.request_timeout_secs.to_string(),
        source("storage.request_timeout_secs", "POZINOX_STORAGE_REQUEST_TIMEOUT_SECS"),
    ));

    let access_token =
        if config.mercadopago.access_token.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "mercadopago.access_token",
        access_token,
        source("mercadopago.access_token", "POZINOX_MERCADOPAGO_ACCESS_TOKEN"),
    ));
    lines.push(render_line(
        "mercadopago.currency",
        &config.mercadopago.currency,
        source("mercadopago.currency", "POZINOX_MERCADOPAGO_CURRENCY"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "POZINOX_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "POZINOX_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("pozinox.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/pozinox.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
