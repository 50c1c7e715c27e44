use std::io::Write;
use std::path::{Path, PathBuf};

use chatcorpus_schema::{QaPair, RawUnit};
use tempfile::NamedTempFile;

const RAW_PREFIX: &str = "raw_corpus_";
const QA_PREFIX: &str = "qa_corpus_";

/// Locations of one run's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub raw: PathBuf,
    pub qa: PathBuf,
}

/// Writes the two per-run corpus artifacts into the export directory.
///
/// Both files are staged as temp files next to their final location and only
/// moved into place once both are complete. Existing artifacts are never
/// overwritten: a taken stamp gets a numeric suffix.
#[derive(Debug, Clone)]
pub struct ExportWriter {
    dir: PathBuf,
}

impl ExportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(
        &self,
        stamp: &str,
        raw: &[RawUnit],
        pairs: &[QaPair],
    ) -> std::io::Result<ExportPaths> {
        std::fs::create_dir_all(&self.dir)?;

        let mut raw_tmp = NamedTempFile::new_in(&self.dir)?;
        raw_tmp.write_all(render_raw(raw).as_bytes())?;
        raw_tmp.as_file().sync_all()?;

        let mut qa_tmp = NamedTempFile::new_in(&self.dir)?;
        qa_tmp.write_all(render_qa(pairs)?.as_bytes())?;
        qa_tmp.as_file().sync_all()?;

        let paths = self.free_paths(stamp);
        raw_tmp
            .persist_noclobber(&paths.raw)
            .map_err(|error| error.error)?;
        if let Err(error) = qa_tmp.persist_noclobber(&paths.qa) {
            let _ = std::fs::remove_file(&paths.raw);
            return Err(error.error);
        }

        Ok(paths)
    }

    fn paths_for(&self, stamp: &str) -> ExportPaths {
        ExportPaths {
            raw: self.dir.join(format!("{RAW_PREFIX}{stamp}.txt")),
            qa: self.dir.join(format!("{QA_PREFIX}{stamp}.jsonl")),
        }
    }

    fn free_paths(&self, stamp: &str) -> ExportPaths {
        let mut candidate = self.paths_for(stamp);
        let mut suffix = 1usize;
        while candidate.raw.exists() || candidate.qa.exists() {
            candidate = self.paths_for(&format!("{stamp}_{suffix}"));
            suffix += 1;
        }
        candidate
    }
}

/// Raw units separated by a blank line.
pub fn render_raw(raw: &[RawUnit]) -> String {
    raw.iter()
        .map(RawUnit::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One `{"input","output"}` object per line.
pub fn render_qa(pairs: &[QaPair]) -> serde_json::Result<String> {
    let lines = pairs
        .iter()
        .map(|pair| serde_json::to_string(&pair.as_example()))
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatcorpus_schema::PairMeta;
    use tempfile::TempDir;

    fn pair(instruction: &str, output: &str) -> QaPair {
        QaPair {
            instruction: instruction.to_owned(),
            output: output.to_owned(),
            meta: PairMeta {
                group: "g1".to_owned(),
                time_gap: 5,
            },
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_produces_both_artifacts() {
        let tmp = TempDir::new().expect("tempdir");
        let writer = ExportWriter::new(tmp.path().join("exports"));
        let raw = vec![RawUnit::from("first"), RawUnit::from("second")];
        let pairs = vec![pair("how?", "like this"), pair("why", "because")];

        let paths = writer
            .write("20240102_030405", &raw, &pairs)
            .expect("write");

        assert_eq!(
            paths.raw,
            tmp.path().join("exports/raw_corpus_20240102_030405.txt")
        );
        assert_eq!(
            paths.qa,
            tmp.path().join("exports/qa_corpus_20240102_030405.jsonl")
        );
        assert_eq!(
            std::fs::read_to_string(&paths.raw).expect("raw"),
            "first\n\nsecond"
        );
        let qa = std::fs::read_to_string(&paths.qa).expect("qa");
        let lines: Vec<&str> = qa.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["input"], "how?");
        assert_eq!(first["output"], "like this");
        assert!(first.get("meta").is_none());

        // No staging files remain.
        assert_eq!(dir_entries(writer.dir()).len(), 2);
    }

    #[test]
    fn test_write_never_overwrites_previous_run() {
        let tmp = TempDir::new().expect("tempdir");
        let writer = ExportWriter::new(tmp.path());

        let first = writer
            .write("20240102_030405", &[RawUnit::from("one")], &[])
            .expect("first");
        let second = writer
            .write("20240102_030405", &[RawUnit::from("two")], &[])
            .expect("second");

        assert_ne!(first.raw, second.raw);
        assert!(second
            .raw
            .ends_with("raw_corpus_20240102_030405_1.txt"));
        assert_eq!(std::fs::read_to_string(&first.raw).expect("first"), "one");
        assert_eq!(std::fs::read_to_string(&second.raw).expect("second"), "two");
    }

    #[test]
    fn test_empty_outputs_are_empty_files() {
        let tmp = TempDir::new().expect("tempdir");
        let writer = ExportWriter::new(tmp.path());

        let paths = writer.write("stamp", &[], &[]).expect("write");
        assert_eq!(std::fs::read_to_string(paths.raw).expect("raw"), "");
        assert_eq!(std::fs::read_to_string(paths.qa).expect("qa"), "");
    }

    #[test]
    fn test_write_into_file_path_fails_without_artifacts() {
        let tmp = TempDir::new().expect("tempdir");
        let blocker = tmp.path().join("exports");
        std::fs::write(&blocker, "not a dir").expect("blocker");

        let writer = ExportWriter::new(&blocker);
        assert!(writer.write("stamp", &[RawUnit::from("x")], &[]).is_err());
        assert_eq!(dir_entries(tmp.path()), vec!["exports".to_owned()]);
    }
}
