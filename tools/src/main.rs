use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;
use serde::Serialize;
use tools::{decode_message_hex, inspect_message, InspectReport};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "netvar-tools",
    version,
    about = "netvar message inspection and decoding tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect message headers and section sizes as JSON.
    Inspect {
        /// A captured message, or a directory of captures.
        path: PathBuf,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected messages.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected messages (after sorting).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the header and section bodies of one message as hex.
    Decode {
        /// Path to the message bytes.
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

#[derive(Serialize)]
struct FileReport {
    path: String,
    #[serde(flatten)]
    report: InspectReport,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let limits = wire::Limits::default();
    match cli.command {
        Command::Inspect {
            path,
            glob,
            sort,
            limit,
        } => {
            let entries = if path.is_dir() {
                let entries = collect_entries(&path, glob.as_deref())?;
                let mut entries = sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                entries
            } else {
                vec![MessageEntry {
                    size: fs::metadata(&path)
                        .with_context(|| format!("stat {}", path.display()))?
                        .len(),
                    path,
                }]
            };

            let mut reports = Vec::with_capacity(entries.len());
            for entry in entries {
                let bytes = fs::read(&entry.path)
                    .with_context(|| format!("read message {}", entry.path.display()))?;
                let report = inspect_message(&bytes, &limits)
                    .with_context(|| format!("inspect {}", entry.path.display()))?;
                debug!(path = %entry.path.display(), bytes = entry.size, "inspected");
                reports.push(FileReport {
                    path: entry.path.display().to_string(),
                    report,
                });
            }
            let json = serde_json::to_string_pretty(&reports).context("serialize json")?;
            println!("{json}");
        }
        Command::Decode { file } => {
            let bytes =
                fs::read(&file).with_context(|| format!("read message {}", file.display()))?;
            let output = decode_message_hex(&bytes, &limits)
                .with_context(|| format!("decode {}", file.display()))?;
            print!("{output}");
        }
    }
    Ok(())
}

struct MessageEntry {
    path: PathBuf,
    size: u64,
}

fn collect_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<MessageEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(MessageEntry { path, size });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn sort_entries(mut entries: Vec<MessageEntry>, sort: Option<InspectSort>) -> Vec<MessageEntry> {
    match sort {
        Some(InspectSort::Size) => {
            entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        }
        None => {}
    }
    entries
}
