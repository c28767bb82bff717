#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use std::fmt;
use std::marker::PhantomData;

use chrono::DateTime;
use chrono::Local;
use chrono::TimeZone;
use chrono::Utc;
use serde::de::IgnoredAny;
use serde::de::SeqAccess;
use serde::de::Visitor;
use serde::Deserialize;
use serde::Deserializer;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Message;
use super::Role;

/// A persisted transcript. `model_names[i]` is the model that produced the
/// i-th assistant reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "time")]
    pub created_at: f64,
    #[serde(rename = "model_name")]
    pub model_names: Vec<String>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(created_at: f64) -> Conversation {
        return Conversation {
            created_at,
            model_names: vec![],
            messages: vec![],
        };
    }

    /// Seconds since the Unix epoch with microsecond precision.
    pub fn timestamp_now() -> f64 {
        return Utc::now().timestamp_micros() as f64 / 1_000_000.0;
    }

    pub fn file_stem(&self) -> String {
        return self.created_at.to_string();
    }

    pub fn created_at_local(&self) -> Option<DateTime<Local>> {
        return timestamp_to_local(self.created_at);
    }

    pub fn exchange_count(&self) -> usize {
        return self
            .messages
            .iter()
            .filter(|msg| return msg.role == Role::Assistant)
            .count();
    }

    pub fn summary(&self) -> ConversationSummary {
        return ConversationSummary {
            created_at: self.created_at,
            first_model: self.model_names.first().cloned(),
            first_message: self.messages.first().map(|msg| return msg.content.to_string()),
        };
    }
}

fn timestamp_to_local(timestamp: f64) -> Option<DateTime<Local>> {
    let micros = (timestamp * 1_000_000.0).round() as i64;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;

    return Utc
        .timestamp_opt(secs, nanos)
        .single()
        .map(|utc| return utc.with_timezone(&Local));
}

/// What the history listing shows for a saved conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationSummary {
    pub created_at: f64,
    pub first_model: Option<String>,
    pub first_message: Option<String>,
}

impl ConversationSummary {
    /// Decodes a summary from a history file payload. Only the first entry of
    /// `model_name` and `messages` is kept, the rest is skipped while parsing.
    pub fn from_json(payload: &[u8]) -> serde_json::Result<ConversationSummary> {
        let record: SummaryRecord = serde_json::from_slice(payload)?;

        return Ok(ConversationSummary {
            created_at: record.time,
            first_model: record.model_name.0,
            first_message: record.messages.0.map(|msg| return msg.content),
        });
    }

    pub fn created_at_local(&self) -> Option<DateTime<Local>> {
        return timestamp_to_local(self.created_at);
    }

    pub fn display_line(&self, max_width: usize) -> String {
        let date = self
            .created_at_local()
            .map(|date| return date.format("%Y/%m/%d %H:%M:%S").to_string())
            .unwrap_or_else(|| return self.created_at.to_string());
        let model = self.first_model.as_deref().unwrap_or("unknown");
        let headline = self
            .first_message
            .as_deref()
            .map(|content| return Message::user(content).headline(max_width))
            .unwrap_or_default();

        return format!("{date} | {model} | {headline}");
    }
}

#[derive(Deserialize)]
struct SummaryRecord {
    time: f64,
    model_name: FirstOf<String>,
    messages: FirstOf<Message>,
}

struct FirstOf<T>(Option<T>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FirstOf<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<FirstOf<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FirstVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for FirstVisitor<T> {
            type Value = FirstOf<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                return formatter.write_str("a sequence");
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<FirstOf<T>, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let first = seq.next_element::<T>()?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}

                return Ok(FirstOf(first));
            }
        }

        return deserializer.deserialize_seq(FirstVisitor(PhantomData));
    }
}
