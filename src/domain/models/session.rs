use super::Conversation;
use super::Message;

/// Transcript side of a chat session. `past_inputs[i]` and
/// `generated_outputs[i]` are the i-th user/assistant pair in `messages`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub past_inputs: Vec<String>,
    pub generated_outputs: Vec<String>,
    pub messages: Vec<Message>,
    pub conversation: Option<Conversation>,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        return self.past_inputs.is_empty()
            && self.generated_outputs.is_empty()
            && self.messages.is_empty()
            && self.conversation.is_none();
    }
}
