//! netdemo - inspect stored recordings
//!
//! Subcommands:
//! - `netdemo list` - Recordings in the storage directory
//! - `netdemo info <name>` - Header, footer and stream totals
//! - `netdemo frames <name>` - Frame offsets and timestamps
//! - `netdemo checkpoints <name>` - Checkpoint catalog
//! - `netdemo events <name>` - Side-channel events
//! - `netdemo config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netdemo_rs::{
    inspect::{Inspector, RecordingSummary},
    DemoConfig, DirectoryStorage,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "netdemo")]
#[command(about = "Inspect recorded network sessions")]
#[command(version)]
struct Cli {
    /// Recordings directory (defaults to the platform data directory)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recordings
    List,

    /// Summarize a recording
    Info {
        /// Recording name
        name: String,
    },

    /// List the frames of a recording
    Frames {
        /// Recording name
        name: String,

        /// Show at most this many frames
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List the checkpoints of a recording
    Checkpoints {
        /// Recording name
        name: String,
    },

    /// List side-channel events
    Events {
        /// Recording name
        name: String,

        /// Only events of this group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,netdemo_rs=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DemoConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DemoConfig::default(),
    };

    match cli.command {
        Commands::Config => print!("{}", config.to_toml_string()?),
        Commands::List => {
            let storage = open_storage(&cli.dir)?;
            let sessions = storage.list_sessions()?;
            if cli.json {
                print_json(&sessions)?;
            } else if sessions.is_empty() {
                println!("No recordings in {}", storage.root().display());
            } else {
                for name in sessions {
                    println!("{}", name);
                }
            }
        }
        Commands::Info { name } => {
            let mut storage = open_storage(&cli.dir)?;
            let summary = Inspector::new(&mut storage, &config, &name)
                .summary()
                .with_context(|| format!("Failed to read recording '{}'", name))?;
            if cli.json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
        Commands::Frames { name, limit } => {
            let mut storage = open_storage(&cli.dir)?;
            let (frames, truncated) = Inspector::new(&mut storage, &config, &name).frames()?;
            let shown = limit.unwrap_or(frames.len()).min(frames.len());
            if cli.json {
                print_json(&frames[..shown])?;
            } else {
                println!("{:>8}  {:>12}  {:>10}  {:>6}", "index", "offset", "time", "bytes");
                for frame in &frames[..shown] {
                    println!(
                        "{:>8}  {:>12}  {:>9.3}s  {:>6}",
                        frame.index, frame.offset, frame.time_seconds, frame.payload_len
                    );
                }
                if shown < frames.len() {
                    println!("... {} more", frames.len() - shown);
                }
                if truncated {
                    println!("(stream ends with a partial frame)");
                }
            }
        }
        Commands::Checkpoints { name } => {
            let mut storage = open_storage(&cli.dir)?;
            let checkpoints = Inspector::new(&mut storage, &config, &name).checkpoints()?;
            if cli.json {
                print_json(&checkpoints)?;
            } else {
                for cp in &checkpoints {
                    println!(
                        "#{:<4} {:>9.3}s  frames@{:<10} external@{:<10} {} objects, {} bytes",
                        cp.index,
                        cp.taken_at_seconds,
                        cp.frame_offset,
                        cp.external_offset,
                        cp.objects,
                        cp.record_bytes
                    );
                }
            }
        }
        Commands::Events { name, group } => {
            let mut storage = open_storage(&cli.dir)?;
            let events = Inspector::new(&mut storage, &config, &name).events(group.as_deref())?;
            if cli.json {
                print_json(&events)?;
            } else {
                for event in &events {
                    println!(
                        "{:>9.3}s  {:<20} {:<12} {} ({} bytes)",
                        event.time_seconds,
                        event.id,
                        event.group,
                        event.meta,
                        event.payload.len()
                    );
                }
            }
        }
    }

    Ok(())
}

fn open_storage(dir: &Option<PathBuf>) -> Result<DirectoryStorage> {
    let storage = match dir {
        Some(dir) => DirectoryStorage::new(dir.clone())?,
        None => DirectoryStorage::open_default()?,
    };
    tracing::debug!("Using recordings in {}", storage.root().display());
    Ok(storage)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summary(summary: &RecordingSummary) {
    let header = &summary.header;
    println!("Recording:   {}", summary.name);
    println!("Scene:       {}", header.scene_name);
    println!(
        "Build:       checksum 0x{:08X}, protocol {}.{}, build {}",
        header.content_checksum,
        header.protocol_version_a,
        header.protocol_version_b,
        header.build_id
    );
    match &summary.metadata {
        Some(meta) => {
            let when = meta
                .recorded_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "Status:      finalized {} ({:.3}s, {} frames, {} checkpoints)",
                when, meta.total_time_seconds, meta.num_frames, meta.checkpoint_count
            );
        }
        None => println!("Status:      live (no footer yet)"),
    }
    println!(
        "Frames:      {} ({} bytes){}",
        summary.frames,
        summary.frame_bytes,
        if summary.truncated { ", partial tail" } else { "" }
    );
    if let (Some(first), Some(last)) = (summary.first_frame_seconds, summary.last_frame_seconds) {
        println!("Span:        {:.3}s - {:.3}s", first, last);
    }
    println!("External:    {}", summary.external_records);
    println!("Checkpoints: {}", summary.checkpoints);
    println!("Events:      {}", summary.events);
    for field in &header.extension_fields {
        println!("Extension:   {}", field);
    }
}
