#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Normal,
    Error,
}

impl MessageType {
    fn is_normal(&self) -> bool {
        return *self == MessageType::Normal;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, rename = "kind", skip_serializing_if = "MessageType::is_normal")]
    mtype: MessageType,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message {
            role,
            content: content.to_string(),
            mtype: MessageType::Normal,
        };
    }

    pub fn new_with_type(role: Role, mtype: MessageType, content: &str) -> Message {
        return Message {
            role,
            content: content.to_string(),
            mtype,
        };
    }

    pub fn user(content: &str) -> Message {
        return Message::new(Role::User, content);
    }

    pub fn assistant(content: &str) -> Message {
        return Message::new(Role::Assistant, content);
    }

    pub fn message_type(&self) -> MessageType {
        return self.mtype;
    }

    /// First line of the content, cut to `max_width` characters with a
    /// trailing ellipsis when it had to be shortened.
    pub fn headline(&self, max_width: usize) -> String {
        let line = self.content.split('\n').next().unwrap_or_default().trim();
        if line.chars().count() <= max_width {
            return line.to_string();
        }

        let cut = line
            .chars()
            .take(max_width.saturating_sub(3))
            .collect::<String>();
        return format!("{cut}...");
    }
}
