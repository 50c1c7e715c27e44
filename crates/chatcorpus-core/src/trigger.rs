//! Chat-command surface for corpus generation.
//!
//! Only configured masters may run it. Every outcome, including failures,
//! comes back as reply text; nothing propagates to the chat host.

use std::path::PathBuf;

use chatcorpus_schema::GenerationSummary;
use tracing::{error, info, warn};

use crate::builder::CorpusBuilder;
use crate::config::CorpusConfig;
use crate::error::CorpusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub user_id: String,
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReply {
    pub text: String,
    /// Files to upload alongside the reply.
    pub attachments: Vec<PathBuf>,
}

impl TriggerReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn denied() -> Self {
        Self::text("permission denied: only masters can generate the corpus")
    }
}

#[derive(Debug, Clone)]
pub struct CorpusTrigger {
    builder: CorpusBuilder,
    masters: Vec<String>,
}

impl CorpusTrigger {
    pub fn new(builder: CorpusBuilder, masters: Vec<String>) -> Self {
        Self { builder, masters }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        Self::new(CorpusBuilder::from_config(config), config.masters.clone())
    }

    pub fn is_authorized(&self, user_id: &str) -> bool {
        self.masters.iter().any(|master| master == user_id)
    }

    pub async fn handle(&self, invocation: &Invocation) -> TriggerReply {
        if !self.is_authorized(&invocation.user_id) {
            warn!(user_id = %invocation.user_id, "unauthorized corpus trigger");
            return TriggerReply::denied();
        }

        info!(
            user_id = %invocation.user_id,
            is_group = invocation.is_group,
            "corpus generation requested"
        );
        match self.builder.generate().await {
            Ok(summary) => render_summary(&summary, invocation.is_group),
            Err(err) => failure_reply(&err),
        }
    }
}

fn render_summary(summary: &GenerationSummary, is_group: bool) -> TriggerReply {
    let mut lines = vec![
        "corpus generated".to_string(),
        format!("source records: {}", summary.source_records),
        format!("raw units: {} (80% target)", summary.raw_units),
        format!("qa pairs: {} (20% target)", summary.qa_pairs),
        format!("saved to: {}", summary.export_dir.display()),
    ];
    if summary.skipped_lines > 0 {
        lines.insert(2, format!("skipped lines: {}", summary.skipped_lines));
    }

    let mut attachments = Vec::new();
    if !is_group {
        if summary.raw_units > 0 {
            attachments.push(summary.raw_path.clone());
        }
        if summary.qa_pairs > 0 {
            attachments.push(summary.qa_path.clone());
        }
    }

    TriggerReply {
        text: lines.join("\n"),
        attachments,
    }
}

fn failure_reply(err: &CorpusError) -> TriggerReply {
    match err {
        CorpusError::SourceMissing { .. } => TriggerReply::text("no chat history recorded yet"),
        CorpusError::EmptySource { .. } => TriggerReply::text("chat history is empty"),
        other => {
            error!(error = %other, "corpus generation failed");
            TriggerReply::text(format!("corpus generation failed: {other}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorpusPaths;
    use crate::linker::ConversationLinker;
    use crate::sampler::CorpusSampler;
    use chatcorpus_schema::MessageRecord;
    use chatcorpus_store::MessageLogWriter;
    use tempfile::TempDir;

    fn paths(tmp: &TempDir) -> CorpusPaths {
        CorpusPaths {
            log_path: tmp.path().join("data/chat_history.jsonl"),
            export_dir: tmp.path().join("exports"),
        }
    }

    fn trigger(tmp: &TempDir) -> CorpusTrigger {
        let builder = CorpusBuilder::new(
            paths(tmp),
            ConversationLinker::default(),
            CorpusSampler::default(),
        )
        .with_seed(Some(5));
        CorpusTrigger::new(builder, vec!["1000".to_string()])
    }

    fn master(is_group: bool) -> Invocation {
        Invocation {
            user_id: "1000".to_string(),
            is_group,
        }
    }

    fn record(msg_id: &str, user: &str, time: i64, content: &str) -> MessageRecord {
        MessageRecord {
            group_id: "g".to_string(),
            user_id: user.to_string(),
            time,
            msg_id: msg_id.to_string(),
            reply_id: None,
            content: content.to_string(),
        }
    }

    async fn seed_log(tmp: &TempDir, records: &[MessageRecord]) {
        let writer = MessageLogWriter::new(paths(tmp).log_path);
        for record in records {
            writer.append(record).await.unwrap();
        }
    }

    #[tokio::test]
    async fn non_master_is_denied() {
        let tmp = TempDir::new().unwrap();
        let reply = trigger(&tmp)
            .handle(&Invocation {
                user_id: "42".to_string(),
                is_group: false,
            })
            .await;
        assert_eq!(reply, TriggerReply::denied());
        assert!(!tmp.path().join("exports").exists());
    }

    #[tokio::test]
    async fn missing_log_reports_no_data() {
        let tmp = TempDir::new().unwrap();
        let reply = trigger(&tmp).handle(&master(false)).await;
        assert_eq!(reply.text, "no chat history recorded yet");
        assert!(reply.attachments.is_empty());
    }

    #[tokio::test]
    async fn empty_log_reports_empty() {
        let tmp = TempDir::new().unwrap();
        let log_path = paths(&tmp).log_path;
        std::fs::create_dir_all(log_path.parent().unwrap()).unwrap();
        std::fs::write(&log_path, "\n\n").unwrap();

        let reply = trigger(&tmp).handle(&master(false)).await;
        assert_eq!(reply.text, "chat history is empty");
    }

    #[tokio::test]
    async fn private_invocation_attaches_non_empty_files() {
        let tmp = TempDir::new().unwrap();
        let records: Vec<_> = (0..10)
            .map(|i| record(&format!("m{i}"), "u", i * 1000, &format!("line number {i}")))
            .collect();
        seed_log(&tmp, &records).await;

        let reply = trigger(&tmp).handle(&master(false)).await;
        assert!(reply.text.contains("source records: 10"), "{}", reply.text);
        assert!(reply.text.contains("raw units: 10"));
        assert!(reply.text.contains("qa pairs: 0"));
        // No pairs, so only the raw corpus is attached.
        assert_eq!(reply.attachments.len(), 1);
        assert!(reply.attachments[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("raw_corpus_"));
    }

    #[tokio::test]
    async fn group_invocation_never_attaches() {
        let tmp = TempDir::new().unwrap();
        seed_log(
            &tmp,
            &[
                record("m1", "a", 0, "anyone around?"),
                record("m2", "b", 10, "yes, what's up"),
            ],
        )
        .await;

        let reply = trigger(&tmp).handle(&master(true)).await;
        assert!(reply.text.contains("source records: 2"));
        assert!(reply.attachments.is_empty());
    }

    #[tokio::test]
    async fn write_failure_becomes_reply_text() {
        let tmp = TempDir::new().unwrap();
        seed_log(&tmp, &[record("m1", "a", 0, "hello world")]).await;
        // A regular file where the export directory should be.
        std::fs::write(tmp.path().join("exports"), "not a dir").unwrap();

        let reply = trigger(&tmp).handle(&master(false)).await;
        assert!(
            reply.text.starts_with("corpus generation failed: "),
            "{}",
            reply.text
        );
        assert!(reply.attachments.is_empty());
    }

    #[test]
    fn summary_mentions_skipped_lines_only_when_present() {
        let mut summary = GenerationSummary {
            source_records: 3,
            skipped_lines: 0,
            raw_units: 1,
            qa_pairs: 1,
            export_dir: PathBuf::from("/out"),
            raw_path: PathBuf::from("/out/raw_corpus_x.txt"),
            qa_path: PathBuf::from("/out/qa_corpus_x.jsonl"),
        };
        let reply = render_summary(&summary, false);
        assert!(!reply.text.contains("skipped"));
        assert!(reply.text.contains("saved to: /out"));
        assert_eq!(reply.attachments.len(), 2);

        summary.skipped_lines = 2;
        let reply = render_summary(&summary, false);
        assert!(reply.text.contains("skipped lines: 2"));
    }
}
