use anyhow::Result;
use once_cell::sync::Lazy;
use test_utils::history_dir;
use test_utils::write_history_file;
use tokio::sync::Mutex;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

// Config is process wide, so tests that load it take turns.
static LOAD_LOCK: Lazy<Mutex<()>> = Lazy::new(|| return Mutex::new(()));

#[test]
fn it_serializes_to_valid_toml() {
    let res = Config::serialize_default(cli::build());
    let doc = res.parse::<toml_edit::Document>().unwrap();

    assert_eq!(doc.get("model").unwrap().as_str(), Some("mock1"));
    assert_eq!(doc.get("max-length").unwrap().as_integer(), Some(30));
    assert_eq!(doc.get("history-dir").unwrap().as_str(), Some("history"));
    assert!(doc.get("config-file").is_none());
    assert!(doc.get("history-file").is_none());
    assert!(res.contains("[possible values: mock1, mock2, gemma]"));
}

#[test]
fn it_uses_kebab_case_keys() {
    assert_eq!(ConfigKey::GemmaURL.to_string(), "gemma-url");
    assert_eq!(ConfigKey::MaxLength.to_string(), "max-length");
    assert_eq!(
        ConfigKey::BackendHealthCheckTimeout.to_string(),
        "backend-health-check-timeout"
    );
}

#[test]
fn it_builds_env_var_names() {
    assert_eq!(Config::env_var(ConfigKey::GemmaURL), "PARLOR_GEMMA_URL");
    assert_eq!(Config::env_var(ConfigKey::MaxLength), "PARLOR_MAX_LENGTH");
}

#[test]
fn it_falls_back_to_defaults() {
    assert_eq!(Config::default(ConfigKey::Model), "mock1");
    assert_eq!(Config::default(ConfigKey::MaxLength), "30");
    assert_eq!(Config::default(ConfigKey::HistoryDir), "history");
    assert!(Config::default(ConfigKey::ConfigFile).ends_with("config.toml"));
}

#[tokio::test]
async fn it_loads_config_from_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches = cli::build().try_get_matches_from(vec!["parlor", "-c", "./config.example.toml"])?;
    Config::load(cli::build(), vec![&matches]).await?;

    assert_eq!(Config::get(ConfigKey::Model), "mock1");
    assert_eq!(Config::get_usize(ConfigKey::MaxLength)?, 30);

    return Ok(());
}

#[tokio::test]
async fn it_prefers_args_over_the_config_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let dir = history_dir();
    let config_path = write_history_file(
        &dir,
        "config.toml",
        "model = \"mock2\"\nmax-length = 120\nhistory-dir = \"/tmp/parlor-history\"\n",
    );
    let config_path = config_path.to_string_lossy().to_string();

    let matches = cli::build().try_get_matches_from(vec![
        "parlor",
        "-c",
        config_path.as_str(),
        "--max-length",
        "64",
    ])?;
    Config::load(cli::build(), vec![&matches]).await?;

    assert_eq!(Config::get(ConfigKey::Model), "mock2");
    assert_eq!(Config::get_usize(ConfigKey::MaxLength)?, 64);
    assert_eq!(Config::get(ConfigKey::HistoryDir), "/tmp/parlor-history");

    return Ok(());
}

#[tokio::test]
async fn it_fails_to_loads_config_from_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches =
        cli::build().try_get_matches_from(vec!["parlor", "-c", "./test/bad-config.toml"])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());

    return Ok(());
}

#[tokio::test]
async fn it_rejects_negative_numbers() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let dir = history_dir();
    let config_path = write_history_file(&dir, "config.toml", "max-length = -5\n");
    let config_path = config_path.to_string_lossy().to_string();

    let matches = cli::build().try_get_matches_from(vec!["parlor", "-c", config_path.as_str()])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());

    return Ok(());
}
