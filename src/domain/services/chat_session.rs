#[cfg(test)]
#[path = "chat_session_test.rs"]
mod tests;

use std::path;

use anyhow::Result;

use super::History;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendFactoryBox;
use crate::domain::models::ChatError;
use crate::domain::models::Conversation;
use crate::domain::models::Message;
use crate::domain::models::MessageType;
use crate::domain::models::ModelName;
use crate::domain::models::Role;
use crate::domain::models::SessionState;

/// Owns one chat session: the transcript, the active model, and the
/// conversation being written to history. Created at session start and
/// mutated only through its methods.
pub struct ChatSession {
    state: SessionState,
    backend: BackendBox,
    model: ModelName,
    max_length: usize,
    factory: BackendFactoryBox,
    history: History,
}

impl ChatSession {
    pub async fn start(
        factory: BackendFactoryBox,
        history: History,
        model: ModelName,
        max_length: usize,
    ) -> Result<ChatSession> {
        ensure_max_length(max_length)?;
        let backend = factory.create(model, max_length).await?;

        return Ok(ChatSession {
            state: SessionState::default(),
            backend,
            model,
            max_length,
            factory,
            history,
        });
    }

    pub fn state(&self) -> &SessionState {
        return &self.state;
    }

    pub fn past_inputs(&self) -> &[String] {
        return &self.state.past_inputs;
    }

    pub fn generated_outputs(&self) -> &[String] {
        return &self.state.generated_outputs;
    }

    pub fn messages(&self) -> &[Message] {
        return &self.state.messages;
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        return self.state.conversation.as_ref();
    }

    pub fn model(&self) -> ModelName {
        return self.model;
    }

    pub fn max_length(&self) -> usize {
        return self.max_length;
    }

    pub fn backend(&self) -> &BackendBox {
        return &self.backend;
    }

    pub fn history(&self) -> &History {
        return &self.history;
    }

    /// Starts over with an empty transcript. Anything not yet saved is gone.
    /// The active model and max length stay as they are.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        tracing::debug!("Session reset");
    }

    /// Switches to `name` when it differs from the active model, then applies
    /// `max_length` to whichever backend ends up active. A failed switch
    /// leaves the previous backend in place.
    pub async fn select_model(&mut self, name: &str, max_length: usize) -> Result<()> {
        let model = ModelName::parse(name)?;
        ensure_max_length(max_length)?;

        if model != self.model {
            let backend = self.factory.create(model, max_length).await?;
            tracing::info!(from = %self.model, to = %model, "Switched model");
            self.backend = backend;
            self.model = model;
        }

        self.backend.set_max_length(max_length);
        self.max_length = max_length;

        return Ok(());
    }

    /// Runs one exchange and writes the conversation to history. A failed
    /// generation is recorded as an error reply so the transcript keeps its
    /// user/assistant pairing.
    pub async fn submit(&mut self, text: &str) -> Result<Message> {
        self.state.messages.push(Message::user(text));
        self.state.past_inputs.push(text.to_string());
        tracing::debug!(model = %self.model, input = text, "User input");

        let reply = match self.backend.generate(text).await {
            Ok(output) => Message::assistant(&output),
            Err(err) => {
                tracing::error!(model = %self.model, error = ?err, "Generation failed");
                let failure = ChatError::GenerationFailure(format!("{err:#}"));
                Message::new_with_type(Role::Assistant, MessageType::Error, &failure.to_string())
            }
        };
        tracing::debug!(response = reply.content.replace('\n', " "), "Response");

        self.state.generated_outputs.push(reply.content.to_string());
        self.state.messages.push(reply.clone());

        let messages = self.state.messages.clone();
        let conversation = self
            .state
            .conversation
            .get_or_insert_with(|| return Conversation::new(Conversation::timestamp_now()));
        conversation.model_names.push(self.model.to_string());
        conversation.messages = messages;

        self.history.save(conversation).await?;

        return Ok(reply);
    }

    /// Replaces the transcript with a saved conversation. The active model and
    /// max length are left alone.
    pub fn load_conversation(&mut self, conversation: Conversation) {
        let mut past_inputs = vec![];
        let mut generated_outputs = vec![];
        for msg in conversation.messages.iter() {
            match msg.role {
                Role::User => past_inputs.push(msg.content.to_string()),
                Role::Assistant => generated_outputs.push(msg.content.to_string()),
            }
        }

        self.state = SessionState {
            past_inputs,
            generated_outputs,
            messages: conversation.messages.clone(),
            conversation: Some(conversation),
        };
    }

    /// Reads a history file into the session. On failure the current session
    /// is untouched.
    pub async fn load_history(&mut self, file_path: &path::Path) -> Result<()> {
        let conversation = self.history.load(file_path).await?;
        tracing::info!(path = ?file_path, "Loaded history file");
        self.load_conversation(conversation);

        return Ok(());
    }
}

fn ensure_max_length(max_length: usize) -> Result<()> {
    if max_length == 0 {
        return Err(ChatError::InvalidMaxLength(max_length).into());
    }

    return Ok(());
}
