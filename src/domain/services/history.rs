#[cfg(test)]
#[path = "history_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use futures::stream;
use futures::Stream;
use futures::StreamExt;
use futures::TryStreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatError;
use crate::domain::models::Conversation;
use crate::domain::models::ConversationSummary;

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub path: path::PathBuf,
    pub summary: ConversationSummary,
}

enum Listing {
    Pending(path::PathBuf),
    Reading(fs::ReadDir),
    Done,
}

/// One JSON file per conversation, named after the conversation's creation
/// timestamp.
#[derive(Clone, Debug)]
pub struct History {
    pub dir: path::PathBuf,
}

impl Default for History {
    fn default() -> History {
        return History::new(path::PathBuf::from(Config::get(ConfigKey::HistoryDir)));
    }
}

impl History {
    pub fn new(dir: path::PathBuf) -> History {
        return History { dir };
    }

    pub fn path_for(&self, created_at: f64) -> path::PathBuf {
        return self.dir.join(format!("{created_at}.json"));
    }

    /// Writes the conversation, replacing any earlier save with the same
    /// creation timestamp. The file is closed before this returns.
    pub async fn save(&self, conversation: &Conversation) -> Result<path::PathBuf> {
        let payload = serde_json::to_string(conversation)?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let file_path = self.path_for(conversation.created_at);
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(
            path = ?file_path,
            messages = conversation.messages.len(),
            "Saved conversation"
        );

        return Ok(file_path);
    }

    pub async fn load(&self, file_path: &path::Path) -> Result<Conversation> {
        if !file_path.exists() {
            return Err(ChatError::HistoryNotFound {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        let payload = fs::read(file_path).await?;
        let conversation: Conversation =
            serde_json::from_slice(&payload).map_err(|source| {
                return ChatError::CorruptHistory {
                    path: file_path.to_path_buf(),
                    source,
                };
            })?;

        if conversation.model_names.len() != conversation.exchange_count() {
            tracing::warn!(
                path = ?file_path,
                models = conversation.model_names.len(),
                exchanges = conversation.exchange_count(),
                "Model names do not line up with assistant replies"
            );
        }

        return Ok(conversation);
    }

    /// Lazily walks the history directory, yielding a summary per `.json`
    /// file. Every call starts a fresh walk. A file that can't be read or
    /// decoded yields an error for that entry only.
    pub fn list(&self) -> impl Stream<Item = Result<HistoryEntry>> {
        return stream::unfold(Listing::Pending(self.dir.clone()), |listing| {
            return next_entry(listing);
        });
    }

    /// Every readable entry, newest first. Entries that fail to read or decode
    /// are logged and left out.
    pub async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let mut entries = self
            .list()
            .filter_map(|entry| {
                return async move {
                    match entry {
                        Ok(entry) => return Some(Ok(entry)),
                        Err(err) => match err.downcast_ref::<ChatError>() {
                            Some(ChatError::CorruptHistory { path, .. })
                            | Some(ChatError::UnreadableHistory { path, .. }) => {
                                tracing::warn!(path = ?path, error = %err, "Skipping history file");
                                return None;
                            }
                            _ => return Some(Err(err)),
                        },
                    }
                };
            })
            .try_collect::<Vec<HistoryEntry>>()
            .await?;

        entries.sort_by(|a, b| {
            return b.summary.created_at.total_cmp(&a.summary.created_at);
        });

        return Ok(entries);
    }

    pub async fn delete(&self, file_path: &path::Path) -> Result<()> {
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }

    /// Removes every conversation file. Anything else in the directory is
    /// left alone.
    pub async fn delete_all(&self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }

        let mut read_dir = fs::read_dir(&self.dir).await?;
        while let Some(file) = read_dir.next_entry().await? {
            let file_path = file.path();
            if !is_history_file(&file_path).await {
                continue;
            }

            fs::remove_file(&file_path).await?;
            tracing::info!(path = ?file_path, "Deleted conversation");
        }

        return Ok(());
    }
}

async fn next_entry(listing: Listing) -> Option<(Result<HistoryEntry>, Listing)> {
    let mut read_dir = match listing {
        Listing::Pending(dir) => {
            if !dir.exists() {
                return None;
            }
            match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(err) => return Some((Err(err.into()), Listing::Done)),
            }
        }
        Listing::Reading(read_dir) => read_dir,
        Listing::Done => return None,
    };

    loop {
        let file = match read_dir.next_entry().await {
            Ok(Some(file)) => file,
            Ok(None) => return None,
            Err(err) => return Some((Err(err.into()), Listing::Done)),
        };

        let file_path = file.path();
        if !has_json_extension(&file_path) {
            continue;
        }

        // Directories named like conversations are not entries. Paths whose
        // metadata can't be read are, so the read below reports them.
        if let Ok(metadata) = fs::metadata(&file_path).await {
            if !metadata.is_file() {
                continue;
            }
        }

        let entry = read_entry(file_path).await;
        return Some((entry, Listing::Reading(read_dir)));
    }
}

fn has_json_extension(file_path: &path::Path) -> bool {
    return file_path.extension().and_then(|ext| return ext.to_str()) == Some("json");
}

async fn is_history_file(file_path: &path::Path) -> bool {
    if !has_json_extension(file_path) {
        return false;
    }

    match fs::symlink_metadata(file_path).await {
        Ok(metadata) => return !metadata.is_dir(),
        Err(_) => return false,
    }
}

async fn read_entry(file_path: path::PathBuf) -> Result<HistoryEntry> {
    let payload = fs::read(&file_path).await.map_err(|source| {
        return ChatError::UnreadableHistory {
            path: file_path.clone(),
            source,
        };
    })?;
    let summary = ConversationSummary::from_json(&payload).map_err(|source| {
        return ChatError::CorruptHistory {
            path: file_path.clone(),
            source,
        };
    })?;

    return Ok(HistoryEntry {
        path: file_path,
        summary,
    });
}
