use std::collections::HashMap;

use super::*;
use tempfile::TempDir;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("kiosk.toml");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn defaults_point_at_local_backend() {
    let settings = Settings::default();
    assert_eq!(settings.backend_url, "http://127.0.0.1:5000");
    assert_eq!(settings.jpeg_quality, 92);
    assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    assert!(settings.database_url.starts_with("sqlite://"));
    assert!(settings.database_url.ends_with("attendance-kiosk/kiosk.db"));
    settings.validate().expect("defaults are valid");
}

#[test]
fn file_overrides_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
backend_url = "http://10.0.0.5:5000"
jpeg_quality = 80
"#,
    );

    let settings = load_settings_with(Some(&path), env_of(&[])).expect("settings");
    assert_eq!(settings.backend_url, "http://10.0.0.5:5000");
    assert_eq!(settings.jpeg_quality, 80);
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
backend_url = "http://10.0.0.5:5000"
database_url = "sqlite://file.db"
request_timeout_secs = 5
"#,
    );

    let settings = load_settings_with(
        Some(&path),
        env_of(&[
            ("KIOSK_BACKEND_URL", "http://legacy:5000"),
            ("APP__BACKEND_URL", "http://env:5000"),
            ("DATABASE_URL", "sqlite://env.db"),
            ("APP__REQUEST_TIMEOUT_SECS", "12"),
        ]),
    )
    .expect("settings");
    assert_eq!(settings.backend_url, "http://env:5000");
    assert_eq!(settings.database_url, "sqlite://env.db");
    assert_eq!(settings.request_timeout_secs, 12);
}

#[test]
fn unparsable_numeric_env_is_ignored() {
    let settings = load_settings_with(
        None,
        env_of(&[("APP__JPEG_QUALITY", "high"), ("APP__REQUEST_TIMEOUT_SECS", "-1")]),
    )
    .expect("settings");
    assert_eq!(settings.jpeg_quality, 92);
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn cli_overrides_everything() {
    let mut settings =
        load_settings_with(None, env_of(&[("APP__BACKEND_URL", "http://env:5000")]))
            .expect("settings");
    settings.apply_cli(Some("https://cli.example:8443".into()), None);
    assert_eq!(settings.backend_url, "https://cli.example:8443");
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    assert!(load_settings_with(Some(&missing), env_of(&[])).is_err());
}

#[test]
fn malformed_config_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "jpeg_quality = \"ninety\"");
    assert!(load_settings_with(Some(&path), env_of(&[])).is_err());
}

#[test]
fn validate_rejects_bad_backend_and_quality() {
    let mut settings = Settings {
        backend_url: "ftp://127.0.0.1".into(),
        ..Settings::default()
    };
    assert!(settings.validate().is_err());

    settings.backend_url = "http://127.0.0.1:5000".into();
    settings.jpeg_quality = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/kiosk.db"),
        "sqlite://./data/kiosk.db"
    );
    assert_eq!(normalize_database_url("sqlite:kiosk.db"), "sqlite://kiosk.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), default_database_url());
}
