use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub mercadopago: MercadoPagoConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub public_base_url: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub local_root: PathBuf,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<SecretString>,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MercadoPagoConfig {
    pub access_token: Option<SecretString>,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Local,
    Supabase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub storage_backend: Option<StorageBackend>,
    pub storage_local_root: Option<PathBuf>,
    pub mercadopago_access_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pozinox.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                public_base_url: "http://127.0.0.1:8080".to_string(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                bucket: "pozinox-media".to_string(),
                local_root: PathBuf::from("media"),
                supabase_url: None,
                supabase_key: None,
                request_timeout_secs: 30,
            },
            mercadopago: MercadoPagoConfig { access_token: None, currency: "CLP".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "supabase" => Ok(Self::Supabase),
            other => Err(ConfigError::Validation(format!(
                "unsupported storage backend `{other}` (expected local|supabase)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Load configuration with precedence: programmatic overrides > env >
    /// `pozinox.toml` > built-in defaults. Validation runs last and fails
    /// fast with an actionable message.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pozinox.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_base_url) = server.public_base_url {
                self.server.public_base_url = public_base_url;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(backend) = storage.backend {
                self.storage.backend = backend;
            }
            if let Some(bucket) = storage.bucket {
                self.storage.bucket = bucket;
            }
            if let Some(local_root) = storage.local_root {
                self.storage.local_root = PathBuf::from(local_root);
            }
            if let Some(supabase_url) = storage.supabase_url {
                self.storage.supabase_url = Some(supabase_url);
            }
            if let Some(supabase_key_value) = storage.supabase_key {
                self.storage.supabase_key = Some(secret_value(supabase_key_value));
            }
            if let Some(request_timeout_secs) = storage.request_timeout_secs {
                self.storage.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(mercadopago) = patch.mercadopago {
            if let Some(access_token_value) = mercadopago.access_token {
                self.mercadopago.access_token = Some(secret_value(access_token_value));
            }
            if let Some(currency) = mercadopago.currency {
                self.mercadopago.currency = currency;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("POZINOX_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("POZINOX_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("POZINOX_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("POZINOX_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("POZINOX_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POZINOX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("POZINOX_SERVER_PORT") {
            self.server.port = parse_u16("POZINOX_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("POZINOX_SERVER_PUBLIC_BASE_URL") {
            self.server.public_base_url = value;
        }

        if let Some(value) = read_env("POZINOX_STORAGE_BACKEND") {
            self.storage.backend = value.parse()?;
        }
        if let Some(value) = read_env("POZINOX_STORAGE_BUCKET") {
            self.storage.bucket = value;
        }
        if let Some(value) = read_env("POZINOX_STORAGE_LOCAL_ROOT") {
            self.storage.local_root = PathBuf::from(value);
        }
        if let Some(value) = read_env("POZINOX_SUPABASE_URL") {
            self.storage.supabase_url = Some(value);
        }
        if let Some(value) = read_env("POZINOX_SUPABASE_KEY") {
            self.storage.supabase_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("POZINOX_STORAGE_REQUEST_TIMEOUT_SECS") {
            self.storage.request_timeout_secs =
                parse_u64("POZINOX_STORAGE_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POZINOX_MERCADOPAGO_ACCESS_TOKEN") {
            self.mercadopago.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("POZINOX_MERCADOPAGO_CURRENCY") {
            self.mercadopago.currency = value;
        }

        let log_level = read_env("POZINOX_LOGGING_LEVEL").or_else(|| read_env("POZINOX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("POZINOX_LOGGING_FORMAT").or_else(|| read_env("POZINOX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(storage_backend) = overrides.storage_backend {
            self.storage.backend = storage_backend;
        }
        if let Some(storage_local_root) = overrides.storage_local_root {
            self.storage.local_root = storage_local_root;
        }
        if let Some(access_token) = overrides.mercadopago_access_token {
            self.mercadopago.access_token = Some(secret_value(access_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_storage(&self.storage)?;
        validate_mercadopago(&self.mercadopago)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pozinox.toml"), PathBuf::from("config/pozinox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    let base_url = server.public_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "server.public_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.bucket.trim().is_empty() {
        return Err(ConfigError::Validation("storage.bucket must not be empty".to_string()));
    }

    if storage.request_timeout_secs == 0 || storage.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "storage.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if storage.backend == StorageBackend::Supabase {
        let url_missing =
            storage.supabase_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if url_missing {
            return Err(ConfigError::Validation(
                "storage.supabase_url is required for the supabase backend".to_string(),
            ));
        }
        if let Some(url) = &storage.supabase_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "storage.supabase_url must start with http:// or https://".to_string(),
                ));
            }
        }

        let key_missing = storage
            .supabase_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if key_missing {
            return Err(ConfigError::Validation(
                "storage.supabase_key is required for the supabase backend. Get it from your Supabase project settings > API keys".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_mercadopago(mercadopago: &MercadoPagoConfig) -> Result<(), ConfigError> {
    let currency = mercadopago.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "mercadopago.currency must be a 3-letter uppercase ISO code (e.g. CLP)".to_string(),
        ));
    }

    if let Some(token) = &mercadopago.access_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "mercadopago.access_token must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    storage: Option<StoragePatch>,
    mercadopago: Option<MercadoPagoPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    backend: Option<StorageBackend>,
    bucket: Option<String>,
    local_root: Option<String>,
    supabase_url: Option<String>,
    supabase_key: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MercadoPagoPatch {
    access_token: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, StorageBackend};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_and_validate() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.database.url == "sqlite://pozinox.db", "default database url")?;
        ensure(config.storage.backend == StorageBackend::Local, "default storage backend")?;
        ensure(config.mercadopago.currency == "CLP", "default currency")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SUPABASE_KEY", "service-role-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pozinox.toml");
            fs::write(
                &path,
                r#"
[storage]
backend = "supabase"
supabase_url = "https://project.supabase.co"
supabase_key = "${TEST_SUPABASE_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config
                .storage
                .supabase_key
                .as_ref()
                .ok_or_else(|| "supabase key should be set".to_string())?;
            ensure(
                key.expose_secret() == "service-role-from-env",
                "supabase key should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_SUPABASE_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POZINOX_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("POZINOX_STORAGE_BUCKET", "bucket-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pozinox.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[storage]
bucket = "bucket-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.storage.bucket == "bucket-from-env",
                "env bucket should win over file and defaults",
            )
        })();

        clear_vars(&["POZINOX_DATABASE_URL", "POZINOX_STORAGE_BUCKET"]);
        result
    }

    #[test]
    fn supabase_backend_requires_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POZINOX_STORAGE_BACKEND", "supabase");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("storage.supabase_url")
            );
            ensure(has_message, "validation failure should mention storage.supabase_url")
        })();

        clear_vars(&["POZINOX_STORAGE_BACKEND"]);
        result
    }

    #[test]
    fn currency_must_be_three_uppercase_letters() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POZINOX_MERCADOPAGO_CURRENCY", "pesos");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected currency validation failure".to_string()),
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("mercadopago.currency")
            );
            ensure(has_message, "validation failure should mention mercadopago.currency")
        })();

        clear_vars(&["POZINOX_MERCADOPAGO_CURRENCY"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POZINOX_SUPABASE_KEY", "sb-secret-value");
        env::set_var("POZINOX_MERCADOPAGO_ACCESS_TOKEN", "APP_USR-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sb-secret-value"), "debug output should not contain key")?;
            ensure(
                !debug.contains("APP_USR-secret-value"),
                "debug output should not contain access token",
            )
        })();

        clear_vars(&["POZINOX_SUPABASE_KEY", "POZINOX_MERCADOPAGO_ACCESS_TOKEN"]);
        result
    }
}
