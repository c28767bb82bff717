#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use owo_colors::Stream;
use strum::IntoEnumIterator;
use tokio::io;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;

use crate::domain::models::ChatError;
use crate::domain::models::Message;
use crate::domain::models::MessageType;
use crate::domain::models::ModelName;
use crate::domain::models::Role;
use crate::domain::models::SlashCommand;
use crate::domain::services::ChatSession;
use crate::domain::services::HistoryEntry;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /new (/n) - Starts a new conversation. The current one stays in history.
- /model (/m) [MODEL_NAME] - Switches the active model. See /models for the options.
- /models - Lists all available models.
- /maxlength (/ml) [NUMBER] - Sets the maximum generation length for the active model.
- /history (/hi) - Lists saved conversations, newest first.
- /load (/l) [INDEX] - Resumes a conversation from the /history list.
- /quit /exit (/q) - Exit Parlor.
- /help (/h) - Provides this help menu.
        "#;

    return text.trim().to_string();
}

#[derive(Debug, PartialEq)]
pub enum Reply {
    Quit,
    Notice(String),
    Error(String),
    Assistant(Message),
    /// The exchange happened but could not be written to history.
    Unsaved { reply: Message, error: String },
    Transcript(Vec<Message>),
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => return "You",
        Role::Assistant => return "Assistant",
    }
}

fn render_message(msg: &Message) -> String {
    let label = format!("{}:", role_label(msg.role));
    let label = match msg.role {
        Role::User => label
            .if_supports_color(Stream::Stdout, |text| return text.green())
            .to_string(),
        Role::Assistant => label
            .if_supports_color(Stream::Stdout, |text| return text.cyan())
            .to_string(),
    };

    if msg.message_type() == MessageType::Error {
        let content = msg
            .content
            .if_supports_color(Stream::Stdout, |text| return text.red())
            .to_string();
        return format!("{label} {content}");
    }

    return format!("{label} {}", msg.content);
}

pub fn render_transcript(messages: &[Message]) -> String {
    return messages
        .iter()
        .map(render_message)
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Reply::Quit => return "".to_string(),
        Reply::Notice(text) => {
            return text
                .if_supports_color(Stream::Stdout, |text| return text.dimmed())
                .to_string();
        }
        Reply::Error(text) => {
            return text
                .if_supports_color(Stream::Stdout, |text| return text.red())
                .to_string();
        }
        Reply::Assistant(msg) => return render_message(msg),
        Reply::Unsaved { reply, error } => {
            let error = error
                .if_supports_color(Stream::Stdout, |text| return text.red())
                .to_string();
            return format!("{}\n{error}", render_message(reply));
        }
        Reply::Transcript(messages) => return render_transcript(messages),
    }
}

/// Converts failures the user can act on into an error reply. Anything else
/// (a failed history write, a broken terminal) stays an error.
fn surface(err: anyhow::Error) -> Result<Reply> {
    if err.downcast_ref::<ChatError>().is_some() {
        tracing::warn!(error = %err, "Command failed");
        return Ok(Reply::Error(err.to_string()));
    }

    return Err(err);
}

fn wants_spinner(line: &str) -> bool {
    if let Some(cmd) = SlashCommand::parse(line) {
        return cmd.is_model_set() || cmd.is_history_load();
    }

    return !line.trim().is_empty();
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));

    return spinner;
}

/// Maps typed lines onto session operations.
pub struct Repl {
    session: ChatSession,
    listing: Vec<HistoryEntry>,
}

impl Repl {
    pub fn new(session: ChatSession) -> Repl {
        return Repl {
            session,
            listing: vec![],
        };
    }

    pub fn session(&self) -> &ChatSession {
        return &self.session;
    }

    /// Returns `None` for blank lines.
    pub async fn handle(&mut self, line: &str) -> Result<Option<Reply>> {
        let text = line.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let cmd = match SlashCommand::parse(text) {
            Some(cmd) => cmd,
            None => return self.submit(text).await.map(Some),
        };

        if cmd.is_quit() {
            return Ok(Some(Reply::Quit));
        }

        if cmd.is_help() {
            return Ok(Some(Reply::Notice(help_text())));
        }

        if cmd.is_new_chat() {
            self.session.reset();
            return Ok(Some(Reply::Notice(
                "Started a new conversation.".to_string(),
            )));
        }

        if cmd.is_model_list() {
            let active = self.session.model();
            let models = ModelName::iter()
                .map(|model| {
                    if model == active {
                        return format!("- {model} (active)");
                    }
                    return format!("- {model}");
                })
                .collect::<Vec<String>>();
            return Ok(Some(Reply::Notice(models.join("\n"))));
        }

        if cmd.is_model_set() {
            return self.model_set(cmd.arg()).await.map(Some);
        }

        if cmd.is_max_length_set() {
            return self.max_length_set(cmd.arg()).await.map(Some);
        }

        if cmd.is_history_list() {
            return self.history_list().await.map(Some);
        }

        if cmd.is_history_load() {
            return self.history_load(cmd.arg()).await.map(Some);
        }

        return Ok(None);
    }

    /// The exchange stays in the session when the history write fails, so the
    /// next successful submit saves it.
    async fn submit(&mut self, text: &str) -> Result<Reply> {
        let err = match self.session.submit(text).await {
            Ok(reply) => return Ok(Reply::Assistant(reply)),
            Err(err) => err,
        };

        let reply = match self.session.messages().last() {
            Some(reply) => reply.clone(),
            None => return Err(err),
        };
        tracing::error!(error = ?err, "Failed to save conversation");

        return Ok(Reply::Unsaved {
            reply,
            error: format!("Could not save conversation: {err:#}"),
        });
    }

    async fn model_set(&mut self, name: Option<&str>) -> Result<Reply> {
        let name = match name {
            Some(name) => name,
            None => {
                return Ok(Reply::Error(
                    "You must specify a model name with `/model` or `/m`. Run `/help` for more details."
                        .to_string(),
                ));
            }
        };

        let max_length = self.session.max_length();
        if let Err(err) = self.session.select_model(name, max_length).await {
            return surface(err);
        }

        return Ok(Reply::Notice(format!(
            "{} has entered the chat.",
            self.session.model()
        )));
    }

    async fn max_length_set(&mut self, value: Option<&str>) -> Result<Reply> {
        let max_length = match value.map(|value| return value.parse::<usize>()) {
            Some(Ok(max_length)) if max_length > 0 => max_length,
            _ => {
                return Ok(Reply::Error(
                    "You must specify a positive number with `/maxlength` or `/ml`.".to_string(),
                ));
            }
        };

        let model = self.session.model().to_string();
        if let Err(err) = self.session.select_model(&model, max_length).await {
            return surface(err);
        }

        return Ok(Reply::Notice(format!("Max length set to {max_length}.")));
    }

    async fn history_list(&mut self) -> Result<Reply> {
        self.listing = self.session.history().entries().await?;
        if self.listing.is_empty() {
            return Ok(Reply::Notice(
                "There are no saved conversations yet.".to_string(),
            ));
        }

        let lines = self
            .listing
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let n = idx + 1;
                return format!("- ({n}) {}", entry.summary.display_line(70));
            })
            .collect::<Vec<String>>();

        return Ok(Reply::Notice(lines.join("\n")));
    }

    async fn history_load(&mut self, index: Option<&str>) -> Result<Reply> {
        if self.listing.is_empty() {
            self.listing = self.session.history().entries().await?;
        }

        let idx = match index.map(|index| return index.parse::<usize>()) {
            Some(Ok(idx)) if idx >= 1 && idx <= self.listing.len() => idx,
            _ => {
                return Ok(Reply::Error(format!(
                    "You must pass an index between 1 and {} from `/history`.",
                    self.listing.len()
                )));
            }
        };

        let file_path = self.listing[idx - 1].path.clone();
        if let Err(err) = self.session.load_history(&file_path).await {
            return surface(err);
        }

        return Ok(Reply::Transcript(self.session.messages().to_vec()));
    }
}

async fn print_prompt(stdout: &mut io::Stdout) -> Result<()> {
    let prompt = "> "
        .if_supports_color(Stream::Stdout, |text| return text.bold())
        .to_string();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    return Ok(());
}

pub async fn start(session: ChatSession) -> Result<()> {
    let mut repl = Repl::new(session);
    let mut stdout = io::stdout();
    let mut lines = io::BufReader::new(io::stdin()).lines();

    println!(
        "{}",
        render_reply(&Reply::Notice(format!(
            "Chatting with {} (max length {}). Type /help for commands.",
            repl.session().model(),
            repl.session().backend().max_length()
        )))
    );
    if let Some(conversation) = repl.session().conversation() {
        println!(
            "{}",
            render_reply(&Reply::Notice(format!(
                "Resuming {}",
                conversation.summary().display_line(70)
            )))
        );
        println!("{}", render_transcript(repl.session().messages()));
    }

    loop {
        print_prompt(&mut stdout).await?;
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };

        let progress = if wants_spinner(&line) {
            Some(spinner(format!("{} is thinking...", repl.session().model())))
        } else {
            None
        };

        let reply = repl.handle(&line).await;
        if let Some(progress) = progress {
            progress.finish_and_clear();
        }

        match reply? {
            None => continue,
            Some(Reply::Quit) => break,
            Some(reply) => println!("{}", render_reply(&reply)),
        }
    }

    return Ok(());
}
