use chatcorpus_schema::{ChatEvent, MessageRecord};
use chatcorpus_store::MessageLogWriter;
use chrono::Utc;
use tracing::{debug, error};

use crate::config::CorpusConfig;
use crate::error::CorpusError;
use crate::redact::Redactor;

/// Why an event was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotGroup,
    OwnMessage,
    TooShort,
}

#[derive(Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Recorded(MessageRecord),
    Ignored(IgnoreReason),
    /// The append failed. Already logged; the event is not retried.
    Failed(String),
}

/// Records group chat messages into the append-only log.
///
/// Never blocks the host pipeline: every outcome, including a failed append,
/// is returned as a value and the caller keeps dispatching the event.
#[derive(Debug, Clone)]
pub struct Ingestor {
    writer: MessageLogWriter,
    redactor: Redactor,
    min_chars: usize,
    bot_id: Option<String>,
}

impl Ingestor {
    pub fn new(writer: MessageLogWriter, min_chars: usize) -> Self {
        Self {
            writer,
            redactor: Redactor::new(),
            min_chars,
            bot_id: None,
        }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        Self::new(
            MessageLogWriter::new(config.paths().log_path),
            config.ingest.min_chars,
        )
        .with_bot_id(config.bot_id.clone())
    }

    pub fn with_bot_id(mut self, bot_id: Option<String>) -> Self {
        self.bot_id = bot_id;
        self
    }

    /// Build the record for an event without persisting it.
    pub fn prepare(&self, event: &ChatEvent) -> Result<MessageRecord, IgnoreReason> {
        let Some(group_id) = event.group_id.as_ref() else {
            return Err(IgnoreReason::NotGroup);
        };
        if self.is_own_message(event) {
            return Err(IgnoreReason::OwnMessage);
        }

        let text = event.text_content();
        if text.chars().count() < self.min_chars {
            return Err(IgnoreReason::TooShort);
        }

        Ok(MessageRecord {
            group_id: group_id.clone(),
            user_id: event.user_id.clone(),
            time: event.time.unwrap_or_else(|| Utc::now().timestamp()),
            msg_id: event.message_id.clone(),
            reply_id: event.reply_to.clone(),
            content: self.redactor.mask(&text),
        })
    }

    pub async fn ingest(&self, event: &ChatEvent) -> IngestOutcome {
        let record = match self.prepare(event) {
            Ok(record) => record,
            Err(reason) => {
                debug!(?reason, message_id = %event.message_id, "chat event not recorded");
                return IngestOutcome::Ignored(reason);
            }
        };

        match self.writer.append(&record).await {
            Ok(()) => IngestOutcome::Recorded(record),
            Err(source) => {
                let failure = CorpusError::IngestWriteFailure {
                    path: self.writer.path().to_path_buf(),
                    source,
                };
                error!(error = %failure, message_id = %record.msg_id, "failed to record chat message");
                IngestOutcome::Failed(failure.to_string())
            }
        }
    }

    fn is_own_message(&self, event: &ChatEvent) -> bool {
        let user = event.user_id.as_str();
        event.self_id.as_deref() == Some(user) || self.bot_id.as_deref() == Some(user)
    }
}
