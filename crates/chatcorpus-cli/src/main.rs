use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chatcorpus_core::*;
use chatcorpus_schema::{ChatEvent, GenerationSummary};
use chatcorpus_store::MessageLogReader;

#[derive(Parser)]
#[command(name = "chatcorpus", version, about = "Chat log corpus builder")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.chatcorpus",
        help = "Config root directory (contains config/, data/ and exports/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build the raw and QA corpora from the chat log")]
    Generate {
        #[arg(long, help = "Shuffle seed for a reproducible export")]
        seed: Option<u64>,
        #[arg(long, help = "Print the summary as JSON")]
        json: bool,
    },
    #[command(about = "Replay newline-delimited chat events into the log")]
    Ingest {
        #[arg(long, help = "Event file (reads stdin when omitted)")]
        file: Option<PathBuf>,
    },
    #[command(about = "Print text with personal data masked")]
    Mask {
        #[arg(help = "Text to mask")]
        text: String,
    },
    #[command(about = "Validate config and print resolved paths")]
    Validate,
    #[command(about = "Run the corpus command as a chat user would")]
    Trigger {
        #[arg(long, help = "Invoking user id")]
        user: String,
        #[arg(long, help = "Invoke from a group chat")]
        group: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "chatcorpus.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Generate { seed, json } => {
            let config = load_config(&cli.config_root)?;
            let builder =
                CorpusBuilder::from_config(&config).with_seed(seed.or(config.sampling.seed));
            match builder.generate().await {
                Ok(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
                Ok(summary) => print_summary(&summary),
                Err(err) if err.is_no_data() => println!("{err}"),
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Ingest { file } => {
            let config = load_config(&cli.config_root)?;
            let ingestor = Ingestor::from_config(&config);
            let counts = match file {
                Some(path) => {
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("failed to open events: {}", path.display()))?;
                    replay_events(&ingestor, BufReader::new(file)).await?
                }
                None => replay_events(&ingestor, BufReader::new(tokio::io::stdin())).await?,
            };
            println!(
                "recorded: {}, ignored: {}, failed: {}, invalid: {}",
                counts.recorded, counts.ignored, counts.failed, counts.invalid
            );
        }
        Commands::Mask { text } => {
            println!("{}", Redactor::new().mask(&text));
        }
        Commands::Validate => {
            let config = load_config(&cli.config_root)?;
            let paths = config.paths();
            println!("Config valid. {} masters.", config.masters.len());
            let log_state = if MessageLogReader::new(&paths.log_path).exists().await {
                "present"
            } else {
                "not yet created"
            };
            println!("log: {} ({log_state})", paths.log_path.display());
            println!("exports: {}", paths.export_dir.display());
        }
        Commands::Trigger { user, group } => {
            let config = load_config(&cli.config_root)?;
            let reply = CorpusTrigger::from_config(&config)
                .handle(&Invocation {
                    user_id: user,
                    is_group: group,
                })
                .await;
            println!("{}", reply.text);
            for attachment in &reply.attachments {
                println!("attachment: {}", attachment.display());
            }
        }
    }

    Ok(())
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

fn print_summary(summary: &GenerationSummary) {
    println!("source records: {}", summary.source_records);
    if summary.skipped_lines > 0 {
        println!("skipped lines: {}", summary.skipped_lines);
    }
    println!("raw units: {}", summary.raw_units);
    println!("qa pairs: {}", summary.qa_pairs);
    println!("raw corpus: {}", summary.raw_path.display());
    println!("qa corpus: {}", summary.qa_path.display());
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplayCounts {
    recorded: usize,
    ignored: usize,
    failed: usize,
    invalid: usize,
}

async fn replay_events<R>(ingestor: &Ingestor, reader: R) -> Result<ReplayCounts>
where
    R: AsyncBufRead + Unpin,
{
    let mut counts = ReplayCounts::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let event: ChatEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                warn!(line = line_no, error = %err, "skipping invalid chat event");
                counts.invalid += 1;
                continue;
            }
        };
        match ingestor.ingest(&event).await {
            IngestOutcome::Recorded(_) => counts.recorded += 1,
            IngestOutcome::Ignored(_) => counts.ignored += 1,
            IngestOutcome::Failed(_) => counts.failed += 1,
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_generate_with_seed() {
        let cli = Cli::try_parse_from(["chatcorpus", "generate", "--seed", "42"]).unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Generate {
                seed: Some(42),
                json: false
            }
        ));
    }

    #[test]
    fn parses_mask_text() {
        let cli = Cli::try_parse_from(["chatcorpus", "mask", "call 13812345678"]).unwrap();
        match cli.command.unwrap() {
            Commands::Mask { text } => assert_eq!(text, "call 13812345678"),
            _ => panic!("expected mask command"),
        }
    }

    #[test]
    fn parses_trigger_flags() {
        let cli =
            Cli::try_parse_from(["chatcorpus", "trigger", "--user", "1000", "--group"]).unwrap();
        match cli.command.unwrap() {
            Commands::Trigger { user, group } => {
                assert_eq!(user, "1000");
                assert!(group);
            }
            _ => panic!("expected trigger command"),
        }
    }

    #[test]
    fn trigger_requires_user() {
        assert!(Cli::try_parse_from(["chatcorpus", "trigger"]).is_err());
    }

    #[test]
    fn config_root_defaults_to_home_dir() {
        let cli = Cli::try_parse_from(["chatcorpus", "validate"]).unwrap();
        assert_eq!(cli.config_root, PathBuf::from("~/.chatcorpus"));
        assert!(matches!(cli.command.unwrap(), Commands::Validate));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(
            expand_home(Path::new("/srv/chatcorpus")),
            PathBuf::from("/srv/chatcorpus")
        );
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                expand_home(Path::new("~/.chatcorpus")),
                PathBuf::from(home).join(".chatcorpus")
            );
        }
    }

    #[tokio::test]
    async fn replay_counts_each_outcome() {
        let tmp = TempDir::new().unwrap();
        let config = CorpusConfig {
            data_dir: tmp.path().join("data"),
            ..CorpusConfig::default()
        };
        let ingestor = Ingestor::from_config(&config);

        let events = [
            r#"{"group_id":10,"user_id":7,"self_id":1,"message_id":1,"time":100,"text":"hello everyone"}"#,
            r#"{"user_id":7,"self_id":1,"message_id":2,"text":"private hello"}"#,
            "",
            "not json",
            r#"{"group_id":"10","user_id":"8","message_id":"3","time":105,"segments":[{"type":"text","text":"hi"},{"type":"image","url":"x"}]}"#,
        ]
        .join("\n");

        let counts = replay_events(&ingestor, BufReader::new(events.as_bytes()))
            .await
            .unwrap();
        assert_eq!(
            counts,
            ReplayCounts {
                recorded: 2,
                ignored: 1,
                failed: 0,
                invalid: 1,
            }
        );

        let snapshot = MessageLogReader::new(config.paths().log_path)
            .snapshot()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.records[1].content, "hi");
    }
}
