use std::env;
use std::sync::{Mutex, OnceLock};

use pozinox_cli::commands::{config, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("POZINOX_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_rejects_non_sqlite_urls() {
    with_env(&[("POZINOX_DATABASE_URL", "postgres://localhost/pozinox")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_the_demo_catalog_counts() {
    with_env(&[("POZINOX_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("3 categories"));
        assert!(message.contains("3 products"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("POZINOX_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(
            parse_payload(&first.output)["message"],
            parse_payload(&second.output)["message"]
        );
    });
}

#[test]
fn config_attributes_env_overrides_and_redacts_secrets() {
    with_env(
        &[
            ("POZINOX_DATABASE_URL", "sqlite::memory:"),
            ("POZINOX_MERCADOPAGO_ACCESS_TOKEN", "APP_USR-secret-token"),
        ],
        || {
            let output = config::run();

            assert!(output
                .contains("- database.url = sqlite::memory: (source: env (POZINOX_DATABASE_URL))"));
            assert!(output.contains("- mercadopago.access_token = <redacted>"));
            assert!(!output.contains("APP_USR-secret-token"));
            assert!(output.contains("- mercadopago.currency = CLP (source: default)"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "POZINOX_DATABASE_URL",
        "POZINOX_DATABASE_MAX_CONNECTIONS",
        "POZINOX_DATABASE_TIMEOUT_SECS",
        "POZINOX_SERVER_BIND_ADDRESS",
        "POZINOX_SERVER_PORT",
        "POZINOX_SERVER_PUBLIC_BASE_URL",
        "POZINOX_STORAGE_BACKEND",
        "POZINOX_STORAGE_BUCKET",
        "POZINOX_STORAGE_LOCAL_ROOT",
        "POZINOX_SUPABASE_URL",
        "POZINOX_SUPABASE_KEY",
        "POZINOX_STORAGE_REQUEST_TIMEOUT_SECS",
        "POZINOX_MERCADOPAGO_ACCESS_TOKEN",
        "POZINOX_MERCADOPAGO_CURRENCY",
        "POZINOX_LOGGING_LEVEL",
        "POZINOX_LOGGING_FORMAT",
        "POZINOX_LOG_LEVEL",
        "POZINOX_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
