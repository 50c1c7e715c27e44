use chatcorpus_schema::{GenerationSummary, MessageRecord};
use chatcorpus_store::{ExportWriter, MessageLogReader};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::{CorpusConfig, CorpusPaths};
use crate::error::CorpusError;
use crate::linker::{group_records, ConversationLinker};
use crate::sampler::{CorpusSampler, SampledCorpus};
use crate::similarity::SimilarityScorer;

/// Export stamp format, e.g. `20240102_030405`.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Turns the chat log into a raw corpus and a QA corpus.
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    reader: MessageLogReader,
    exporter: ExportWriter,
    linker: ConversationLinker,
    sampler: CorpusSampler,
    seed: Option<u64>,
}

impl CorpusBuilder {
    pub fn new(paths: CorpusPaths, linker: ConversationLinker, sampler: CorpusSampler) -> Self {
        Self {
            reader: MessageLogReader::new(paths.log_path),
            exporter: ExportWriter::new(paths.export_dir),
            linker,
            sampler,
            seed: None,
        }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        let scorer = SimilarityScorer::new(
            config.pairing.ngram_size,
            config.pairing.repeat_threshold,
        );
        Self::new(
            config.paths(),
            ConversationLinker::new(scorer, config.pairing.time_window_secs),
            CorpusSampler::new(config.sampling.qa_ratio),
        )
        .with_seed(config.sampling.seed)
    }

    /// Fix the shuffle seed used by [`CorpusBuilder::generate`].
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn export_dir(&self) -> &std::path::Path {
        self.exporter.dir()
    }

    /// Link and sample records without touching the filesystem.
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        records: Vec<MessageRecord>,
        rng: &mut R,
    ) -> SampledCorpus {
        let groups = group_records(records);
        let linked = self.linker.link_all(&groups);
        info!(
            groups = groups.len(),
            pairs = linked.pairs.len(),
            raw = linked.raw.len(),
            "linked conversations"
        );
        self.sampler.sample(linked.raw, linked.pairs, rng)
    }

    pub async fn generate(&self) -> Result<GenerationSummary, CorpusError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let stamp = chrono::Local::now().format(STAMP_FORMAT).to_string();
        self.generate_with(&mut rng, &stamp).await
    }

    /// Run the whole pipeline with an explicit random source and export stamp.
    pub async fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        stamp: &str,
    ) -> Result<GenerationSummary, CorpusError> {
        let log_path = self.reader.path().to_path_buf();
        let snapshot = self
            .reader
            .snapshot()
            .await
            .map_err(|source| CorpusError::Read {
                path: log_path.clone(),
                source,
            })?
            .ok_or_else(|| CorpusError::SourceMissing {
                path: log_path.clone(),
            })?;

        if snapshot.records.is_empty() {
            return Err(CorpusError::EmptySource { path: log_path });
        }

        let source_records = snapshot.records.len();
        let skipped_lines = snapshot.skipped_lines;
        info!(records = source_records, skipped = skipped_lines, "loaded chat history");

        let corpus = self.assemble(snapshot.records, rng);
        let raw_units = corpus.raw.len();
        let qa_pairs = corpus.pairs.len();

        let exporter = self.exporter.clone();
        let stamp = stamp.to_owned();
        let written = tokio::task::spawn_blocking(move || {
            exporter.write(&stamp, &corpus.raw, &corpus.pairs)
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|result| result)
        .map_err(|source| CorpusError::WriteFailure {
            path: self.exporter.dir().to_path_buf(),
            source,
        })?;

        info!(
            raw = raw_units,
            pairs = qa_pairs,
            raw_path = %written.raw.display(),
            qa_path = %written.qa.display(),
            "corpus exported"
        );

        Ok(GenerationSummary {
            source_records,
            skipped_lines,
            raw_units,
            qa_pairs,
            export_dir: self.exporter.dir().to_path_buf(),
            raw_path: written.raw,
            qa_path: written.qa,
        })
    }
}
