use anyhow::bail;
use anyhow::Result;
use tempfile::TempDir;
use test_utils::conversation_fixture;
use test_utils::history_dir;
use test_utils::write_history_file;

use super::wants_spinner;
use super::Repl;
use super::Reply;
use crate::domain::models::Message;
use crate::domain::models::ModelName;
use crate::domain::services::ChatSession;
use crate::domain::services::History;
use crate::infrastructure::backends::BackendManager;

async fn repl(dir: &TempDir) -> Result<Repl> {
    let session = ChatSession::start(
        Box::new(BackendManager::instant("http://127.0.0.1:1")),
        History::new(dir.path().to_path_buf()),
        ModelName::Mock1,
        30,
    )
    .await?;

    return Ok(Repl::new(session));
}

fn notice(reply: Option<Reply>) -> Result<String> {
    match reply {
        Some(Reply::Notice(text)) => return Ok(text),
        other => bail!(format!("Expected a notice, got {other:?}")),
    }
}

fn error(reply: Option<Reply>) -> Result<String> {
    match reply {
        Some(Reply::Error(text)) => return Ok(text),
        other => bail!(format!("Expected an error, got {other:?}")),
    }
}

#[tokio::test]
async fn it_ignores_blank_lines() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    assert_eq!(repl.handle("   ").await?, None);
    assert!(repl.session().messages().is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_submits_chat_text() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let reply = repl.handle("  hello  ").await?;
    assert_eq!(reply, Some(Reply::Assistant(Message::assistant("Mock response"))));
    assert_eq!(repl.session().past_inputs(), &["hello"]);

    return Ok(());
}

#[tokio::test]
async fn it_keeps_chatting_when_history_cannot_be_saved() -> Result<()> {
    let dir = history_dir();
    let blocker = write_history_file(&dir, "not-a-dir", "");
    let session = ChatSession::start(
        Box::new(BackendManager::instant("http://127.0.0.1:1")),
        History::new(blocker.join("history")),
        ModelName::Mock1,
        30,
    )
    .await?;
    let mut repl = Repl::new(session);

    match repl.handle("hello").await? {
        Some(Reply::Unsaved { reply, error }) => {
            assert_eq!(reply, Message::assistant("Mock response"));
            assert!(error.starts_with("Could not save conversation: "));
        }
        other => bail!(format!("Expected an unsaved reply, got {other:?}")),
    }

    repl.handle("again").await?;
    assert_eq!(repl.session().past_inputs(), &["hello", "again"]);
    assert_eq!(repl.session().generated_outputs().len(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_quits() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    assert_eq!(repl.handle("/quit").await?, Some(Reply::Quit));

    return Ok(());
}

#[tokio::test]
async fn it_starts_new_conversations() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;
    repl.handle("hello").await?;

    let text = notice(repl.handle("/new").await?)?;
    assert_eq!(text, "Started a new conversation.");
    assert!(repl.session().state().is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_lists_models() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = notice(repl.handle("/models").await?)?;
    insta::assert_snapshot!(text, @r###"
    - mock1 (active)
    - mock2
    - gemma
    "###);

    return Ok(());
}

#[tokio::test]
async fn it_switches_models() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = notice(repl.handle("/model mock2").await?)?;
    assert_eq!(text, "mock2 has entered the chat.");
    assert_eq!(repl.session().model(), ModelName::Mock2);
    assert_eq!(repl.session().max_length(), 30);

    return Ok(());
}

#[tokio::test]
async fn it_reports_unknown_models() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = error(repl.handle("/model llama").await?)?;
    assert_eq!(
        text,
        "No model named llama is available. Possible values are: mock1, mock2, gemma"
    );
    assert_eq!(repl.session().model(), ModelName::Mock1);

    return Ok(());
}

#[tokio::test]
async fn it_reports_unavailable_models() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = error(repl.handle("/model gemma").await?)?;
    assert!(text.starts_with("Model gemma could not be loaded"));
    assert_eq!(repl.session().model(), ModelName::Mock1);

    return Ok(());
}

#[tokio::test]
async fn it_requires_a_model_name() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = error(repl.handle("/m").await?)?;
    assert!(text.contains("You must specify a model name"));

    return Ok(());
}

#[tokio::test]
async fn it_sets_max_length() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = notice(repl.handle("/maxlength 200").await?)?;
    assert_eq!(text, "Max length set to 200.");
    assert_eq!(repl.session().max_length(), 200);
    assert_eq!(repl.session().backend().max_length(), 200);
    assert_eq!(repl.session().model(), ModelName::Mock1);

    return Ok(());
}

#[tokio::test]
async fn it_rejects_bad_max_lengths() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    error(repl.handle("/ml").await?)?;
    error(repl.handle("/ml zero").await?)?;
    error(repl.handle("/ml 0").await?)?;
    assert_eq!(repl.session().max_length(), 30);

    return Ok(());
}

#[tokio::test]
async fn it_lists_empty_history() -> Result<()> {
    let dir = history_dir();
    let mut repl = repl(&dir).await?;

    let text = notice(repl.handle("/history").await?)?;
    assert_eq!(text, "There are no saved conversations yet.");

    return Ok(());
}

#[tokio::test]
async fn it_lists_and_loads_history() -> Result<()> {
    let dir = history_dir();
    write_history_file(&dir, "1712000000.25.json", conversation_fixture());
    let mut repl = repl(&dir).await?;

    let text = notice(repl.handle("/history").await?)?;
    assert!(text.starts_with("- (1) "));
    assert!(text.ends_with(" | mock1 | hello"));

    match repl.handle("/load 1").await? {
        Some(Reply::Transcript(messages)) => assert_eq!(messages.len(), 4),
        other => bail!(format!("Expected a transcript, got {other:?}")),
    }
    assert_eq!(repl.session().past_inputs(), &["hello", "how are you?"]);

    return Ok(());
}

#[tokio::test]
async fn it_rejects_out_of_range_history_indexes() -> Result<()> {
    let dir = history_dir();
    write_history_file(&dir, "1712000000.25.json", conversation_fixture());
    let mut repl = repl(&dir).await?;

    let text = error(repl.handle("/load 2").await?)?;
    assert_eq!(text, "You must pass an index between 1 and 1 from `/history`.");

    return Ok(());
}

#[tokio::test]
async fn it_reports_corrupt_history_on_load() -> Result<()> {
    let dir = history_dir();
    let file_path = write_history_file(&dir, "1712000000.25.json", conversation_fixture());
    let mut repl = repl(&dir).await?;
    repl.handle("hi").await?;

    let listing = notice(repl.handle("/history").await?)?;
    assert_eq!(listing.lines().count(), 2);

    std::fs::write(&file_path, r#"{"time": 1712000000.25, "model_name": ["mock1"]}"#)?;

    let text = error(repl.handle("/load 2").await?)?;
    assert!(text.contains("is corrupt"));
    assert_eq!(repl.session().past_inputs(), &["hi"]);

    return Ok(());
}

#[test]
fn it_shows_a_spinner_for_slow_work_only() {
    assert!(wants_spinner("hello"));
    assert!(wants_spinner("/model gemma"));
    assert!(wants_spinner("/load 1"));
    assert!(!wants_spinner("/help"));
    assert!(!wants_spinner("/history"));
    assert!(!wants_spinner("  "));
}
