#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::path;
use std::process;

use anyhow::Error;
use anyhow::Result;
use owo_colors::OwoColorize;

use crate::application::cli;
use crate::application::repl;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ModelName;
use crate::domain::services::ChatSession;
use crate::domain::services::History;
use crate::infrastructure::backends::BackendManager;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        format!(
            "Oh no! Parlor has failed with the following app version and error.\n\nVersion: {}\nError: {:#}",
            env!("CARGO_PKG_VERSION"),
            err
        )
        .red()
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn start_chat() -> Result<()> {
    let model = ModelName::parse(&Config::get(ConfigKey::Model))?;
    let max_length = Config::get_usize(ConfigKey::MaxLength)?;

    let mut session = ChatSession::start(
        Box::new(BackendManager::from_config()?),
        History::default(),
        model,
        max_length,
    )
    .await?;

    let history_file = Config::get(ConfigKey::HistoryFile);
    if !history_file.is_empty() {
        session
            .load_history(&path::PathBuf::from(history_file))
            .await?;
    }

    return repl::start(session).await;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let debug_log_dir = env::var("PARLOR_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("parlor")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("parlor")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let ready_res = cli::parse().await;
    match ready_res {
        Err(ready_err) => {
            handle_error(ready_err);
            return;
        }
        Ok(false) => process::exit(0),
        Ok(true) => {}
    }

    if let Err(err) = start_chat().await {
        handle_error(err);
    }

    drop(_guard);
    process::exit(0);
}
