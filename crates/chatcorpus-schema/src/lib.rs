use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod ids;

/// One line of the append-only chat log.
///
/// Identifiers are stored as strings. Chat platforms emit them as either JSON
/// strings or integers, so both shapes are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(deserialize_with = "ids::required")]
    pub group_id: String,
    #[serde(deserialize_with = "ids::required")]
    pub user_id: String,
    /// Unix seconds.
    pub time: i64,
    #[serde(deserialize_with = "ids::required")]
    pub msg_id: String,
    #[serde(default, deserialize_with = "ids::optional")]
    pub reply_id: Option<String>,
    /// Already redacted.
    pub content: String,
}

impl MessageRecord {
    /// Whether `other` explicitly replies to this record.
    pub fn is_replied_by(&self, other: &MessageRecord) -> bool {
        other.reply_id.as_deref() == Some(self.msg_id.as_str())
    }
}

/// Pair metadata kept for diagnostics; never exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairMeta {
    pub group: String,
    pub time_gap: i64,
}

/// An (instruction, response) pair built from two linked messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub instruction: String,
    pub output: String,
    pub meta: PairMeta,
}

impl QaPair {
    /// Borrowed view in the exported `{"input", "output"}` shape.
    pub fn as_example(&self) -> QaExample<'_> {
        QaExample {
            input: &self.instruction,
            output: &self.output,
        }
    }

    /// Split the pair back into two standalone units.
    pub fn into_raw_units(self) -> [RawUnit; 2] {
        [RawUnit(self.instruction), RawUnit(self.output)]
    }
}

/// Exported line of the QA artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QaExample<'a> {
    pub input: &'a str,
    pub output: &'a str,
}

/// A standalone text snippet with no paired-response structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUnit(pub String);

impl RawUnit {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawUnit {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Structured piece of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageSegment {
    Text {
        text: String,
    },
    /// Images, stickers, files, mentions and anything else without text.
    #[serde(other)]
    Other,
}

/// An inbound chat message as delivered by the host bot framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    /// `None` for private chats.
    #[serde(default, deserialize_with = "ids::optional")]
    pub group_id: Option<String>,
    #[serde(deserialize_with = "ids::required")]
    pub user_id: String,
    /// Account id of the bot receiving the event.
    #[serde(default, deserialize_with = "ids::optional")]
    pub self_id: Option<String>,
    #[serde(deserialize_with = "ids::required")]
    pub message_id: String,
    /// Unix seconds; the ingestor stamps the current time when absent.
    #[serde(default)]
    pub time: Option<i64>,
    /// Message id this event quotes, if any.
    #[serde(default, deserialize_with = "ids::optional")]
    pub reply_to: Option<String>,
    /// Plain-text rendering of the message.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Vec<MessageSegment>,
}

impl ChatEvent {
    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// Textual content only: text segments joined by a space when the event is
    /// structured, otherwise the plain text.
    pub fn text_content(&self) -> String {
        if self.segments.is_empty() {
            return self.text.as_deref().unwrap_or_default().trim().to_owned();
        }

        self.segments
            .iter()
            .filter_map(|segment| match segment {
                MessageSegment::Text { text } => Some(text.as_str()),
                MessageSegment::Other => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_owned()
    }
}

/// Result of one corpus generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub source_records: usize,
    pub skipped_lines: usize,
    pub raw_units: usize,
    pub qa_pairs: usize,
    pub export_dir: PathBuf,
    pub raw_path: PathBuf,
    pub qa_path: PathBuf,
}
