use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use owo_colors::OwoColorize;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::repl::help_text;
use super::repl::render_transcript;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ModelName;
use crate::domain::services::History;
use crate::domain::services::HistoryEntry;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

pub fn format_entry(entry: &HistoryEntry) -> String {
    return format!(
        "- {} ({})",
        entry.summary.display_line(70),
        entry.path.to_string_lossy()
    );
}

async fn print_history_list() -> Result<()> {
    let entries = History::default()
        .entries()
        .await?
        .iter()
        .map(|entry| {
            return format_entry(entry);
        })
        .collect::<Vec<String>>();

    if entries.is_empty() {
        println!("There are no saved conversations. You should start your first one!");
    } else {
        println!("{}", entries.join("\n"));
    }

    return Ok(());
}

async fn print_history_file(file_path: &str) -> Result<()> {
    let conversation = History::default()
        .load(&path::PathBuf::from(file_path))
        .await?;

    println!("{}", conversation.summary().display_line(70).bold());
    println!("{}", render_transcript(&conversation.messages));

    return Ok(());
}

async fn select_history_file_interactive() -> Result<bool> {
    let entries = History::default().entries().await?;
    if entries.is_empty() {
        println!("There are no saved conversations. You should start your first one!");
        return Ok(false);
    }

    let options = entries
        .iter()
        .map(|entry| {
            return entry.summary.display_line(70);
        })
        .collect::<Vec<String>>();

    let selected = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which conversation would you like to resume?")
        .default(0)
        .items(&options)
        .interact_opt()?;

    if let Some(idx) = selected {
        Config::set(
            ConfigKey::HistoryFile,
            &entries[idx].path.to_string_lossy(),
        );
        return Ok(true);
    }

    return Ok(false);
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;
    file.flush().await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn arg_history_file(required: bool) -> Arg {
    return Arg::new(ConfigKey::HistoryFile.to_string())
        .short('f')
        .long("file")
        .help("Path to a saved conversation file.")
        .num_args(1)
        .required(required);
}

fn subcommand_history_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all saved conversations.")
        .arg(arg_history_file(false))
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all saved conversations.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args([ConfigKey::HistoryFile.to_string(), "all".to_string()])
                .required(true),
        );
}

fn subcommand_history() -> Command {
    return Command::new("history")
        .about("Browse saved conversations.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the history directory path."))
        .subcommand(Command::new("list").about("List all saved conversations, newest first."))
        .subcommand(
            Command::new("show")
                .about("Print the transcript of a saved conversation.")
                .arg(arg_history_file(true)),
        )
        .subcommand(
            Command::new("open")
                .about("Resume a saved conversation. Omit the file to pick one interactively.")
                .arg(arg_history_file(false)),
        )
        .subcommand(subcommand_history_delete());
}

fn arg_model() -> Arg {
    return Arg::new(ConfigKey::Model.to_string())
        .short('m')
        .long(ConfigKey::Model.to_string())
        .env(Config::env_var(ConfigKey::Model))
        .num_args(1)
        .help(format!(
            "The model to chat with when the session starts. [default: {}]",
            Config::default(ConfigKey::Model)
        ))
        .value_parser(PossibleValuesParser::new(ModelName::VARIANTS))
        .global(true);
}

fn arg_max_length() -> Arg {
    return Arg::new(ConfigKey::MaxLength.to_string())
        .short('l')
        .long(ConfigKey::MaxLength.to_string())
        .env(Config::env_var(ConfigKey::MaxLength))
        .num_args(1)
        .help(format!(
            "Maximum generation length handed to the model. [default: {}]",
            Config::default(ConfigKey::MaxLength)
        ))
        .global(true);
}

fn subcommand_chat() -> Command {
    return Command::new("chat").about("Start a new conversation.");
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return format!("CHAT {line}").bold().underline().to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("parlor")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_history())
        .arg(arg_model())
        .arg(arg_max_length())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env(Config::env_var(ConfigKey::ConfigFile))
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::HistoryDir.to_string())
                .long(ConfigKey::HistoryDir.to_string())
                .env(Config::env_var(ConfigKey::HistoryDir))
                .num_args(1)
                .help(format!("Directory conversations are saved to. [default: {}]", Config::default(ConfigKey::HistoryDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::MockDelay.to_string())
                .long(ConfigKey::MockDelay.to_string())
                .env(Config::env_var(ConfigKey::MockDelay))
                .num_args(1)
                .help(format!("Milliseconds the mock models wait when loading and before replying. [default: {}]", Config::default(ConfigKey::MockDelay)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::GemmaURL.to_string())
                .long(ConfigKey::GemmaURL.to_string())
                .env(Config::env_var(ConfigKey::GemmaURL))
                .num_args(1)
                .help(format!("Text generation server hosting Gemma. [default: {}]", Config::default(ConfigKey::GemmaURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::BackendHealthCheckTimeout.to_string())
                .long(ConfigKey::BackendHealthCheckTimeout.to_string())
                .env(Config::env_var(ConfigKey::BackendHealthCheckTimeout))
                .num_args(1)
                .help(format!("Time to wait in milliseconds before timing out when health checking a model server. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)))
                .global(true),
        );
}

/// Handles every subcommand that doesn't need a chat session. Returns true
/// when the caller should go on to start one.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("chat", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("history", subcmd_matches)) => {
            let history_file_key = ConfigKey::HistoryFile.to_string();
            match subcmd_matches.subcommand() {
                Some(("dir", dir_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, dir_matches]).await?;
                    println!("{}", History::default().dir.to_string_lossy());
                    return Ok(false);
                }
                Some(("list", list_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, list_matches]).await?;
                    print_history_list().await?;
                    return Ok(false);
                }
                Some(("show", show_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, show_matches]).await?;
                    if let Some(file_path) = show_matches.get_one::<String>(&history_file_key) {
                        print_history_file(file_path).await?;
                    }
                    return Ok(false);
                }
                Some(("open", open_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, open_matches]).await?;
                    if open_matches.get_one::<String>(&history_file_key).is_none() {
                        return select_history_file_interactive().await;
                    }
                }
                Some(("delete", delete_matches)) => {
                    Config::load(build(), vec![&matches, subcmd_matches, delete_matches]).await?;
                    let history = History::default();
                    if let Some(file_path) = delete_matches.get_one::<String>(&history_file_key) {
                        history.delete(&path::PathBuf::from(file_path)).await?;
                        println!("Deleted {file_path}");
                    } else if delete_matches.get_flag("all") {
                        history.delete_all().await?;
                        println!("Deleted all saved conversations");
                    } else {
                        subcommand_history_delete().print_long_help()?;
                    }
                    return Ok(false);
                }
                _ => {
                    subcommand_history().print_long_help()?;
                    return Ok(false);
                }
            }
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(true);
}
