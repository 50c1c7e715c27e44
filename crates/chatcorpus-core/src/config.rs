use std::{fs, path::Path, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::linker::DEFAULT_TIME_WINDOW_SECS;
use crate::sampler::DEFAULT_QA_RATIO;
use crate::similarity::{DEFAULT_NGRAM_SIZE, DEFAULT_REPEAT_THRESHOLD};

/// Location of the config file relative to the config root.
pub const CONFIG_FILE: &str = "config/main.yaml";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_log_file() -> String {
    "chat_history.jsonl".to_string()
}

fn default_time_window_secs() -> i64 {
    DEFAULT_TIME_WINDOW_SECS
}

fn default_ngram_size() -> usize {
    DEFAULT_NGRAM_SIZE
}

fn default_repeat_threshold() -> f64 {
    DEFAULT_REPEAT_THRESHOLD
}

fn default_qa_ratio() -> f64 {
    DEFAULT_QA_RATIO
}

fn default_min_chars() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    #[serde(default = "default_time_window_secs")]
    pub time_window_secs: i64,
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
    #[serde(default = "default_repeat_threshold")]
    pub repeat_threshold: f64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            time_window_secs: default_time_window_secs(),
            ngram_size: default_ngram_size(),
            repeat_threshold: default_repeat_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_qa_ratio")]
    pub qa_ratio: f64,
    /// Fixed shuffle seed for reproducible exports.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            qa_ratio: default_qa_ratio(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Users allowed to trigger corpus generation.
    #[serde(default, deserialize_with = "id_list")]
    pub masters: Vec<String>,
    /// The bot's own account id; its messages are never recorded.
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub pairing: PairingConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_dir: default_export_dir(),
            log_file: default_log_file(),
            masters: Vec::new(),
            bot_id: None,
            pairing: PairingConfig::default(),
            sampling: SamplingConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

/// Resolved file locations handed to the store and the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    pub log_path: PathBuf,
    pub export_dir: PathBuf,
}

impl CorpusConfig {
    pub fn paths(&self) -> CorpusPaths {
        CorpusPaths {
            log_path: self.data_dir.join(&self.log_file),
            export_dir: self.export_dir.clone(),
        }
    }

    fn resolve_env(&mut self) {
        self.data_dir = PathBuf::from(resolve_env_var(&self.data_dir.to_string_lossy()));
        self.export_dir = PathBuf::from(resolve_env_var(&self.export_dir.to_string_lossy()));
        self.log_file = resolve_env_var(&self.log_file);
        if let Some(bot_id) = self.bot_id.as_mut() {
            *bot_id = resolve_env_var(bot_id);
        }
    }

    /// Anchor relative directories at the config root.
    fn anchor(&mut self, root: &Path) {
        if self.data_dir.is_relative() {
            self.data_dir = root.join(&self.data_dir);
        }
        if self.export_dir.is_relative() {
            self.export_dir = root.join(&self.export_dir);
        }
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `<root>/config/main.yaml`, falling back to defaults when the file is
/// absent. Relative directories resolve against `root`.
pub fn load_config(root: &Path) -> Result<CorpusConfig> {
    let path = root.join(CONFIG_FILE);
    let mut config = if path.exists() {
        read_yaml_file(&path)?
    } else {
        CorpusConfig::default()
    };

    config.resolve_env();
    config.anchor(root);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &CorpusConfig) -> Result<()> {
    if config.log_file.trim().is_empty() {
        return Err(anyhow!("log_file must not be empty"));
    }
    if config.pairing.ngram_size == 0 {
        return Err(anyhow!("pairing.ngram_size must be at least 1"));
    }
    if !(0.0..=1.0).contains(&config.pairing.repeat_threshold) {
        return Err(anyhow!(
            "pairing.repeat_threshold must be within [0, 1]: {}",
            config.pairing.repeat_threshold
        ));
    }
    if !(0.0..=1.0).contains(&config.sampling.qa_ratio) {
        return Err(anyhow!(
            "sampling.qa_ratio must be within [0, 1]: {}",
            config.sampling.qa_ratio
        ));
    }
    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

/// YAML users write ids both bare (`12345`) and quoted (`"12345"`).
fn id_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(Vec::<Id>::deserialize(deserializer)?
        .into_iter()
        .map(|id| match id {
            Id::Text(text) => text,
            Id::Number(number) => number.to_string(),
        })
        .collect())
}
