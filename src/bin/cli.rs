//! SegKV CLI
//!
//! Command-line interface for a SegKV data directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use segkv::{Config, Store, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// SegKV CLI
#[derive(Parser, Debug)]
#[command(name = "segkv-cli")]
#[command(about = "CLI for the SegKV segmented key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./segkv_data")]
    data_dir: PathBuf,

    /// Active segment size in bytes before rotation
    #[arg(short = 'c', long, default_value_t = segkv::config::DEFAULT_SEGMENT_CAPACITY)]
    segment_capacity: u64,

    /// fsync after every put
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Print the total size of all segments in bytes
    Size,

    /// Print segment, record and key counts
    Stats,

    /// Merge all segments into OUTPUT_DIR/merged-segment, leaving the store as is
    Merge {
        /// Directory to write the merged segment to
        output_dir: PathBuf,
    },

    /// Compact sealed segments in place
    Compact,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let sync_strategy = if args.sync {
        SyncStrategy::EveryWrite
    } else {
        SyncStrategy::OnSeal
    };

    let config = Config::builder()
        .data_dir(args.data_dir.clone())
        .segment_capacity(args.segment_capacity)
        .sync_strategy(sync_strategy)
        .build();

    let store = match Store::open(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&store, args.command);
    let closed = store.close();

    if let Err(e) = outcome {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = closed {
        tracing::error!("Failed to close store: {}", e);
        std::process::exit(1);
    }
}

fn run(store: &Store, command: Commands) -> segkv::Result<()> {
    match command {
        Commands::Get { key } => {
            let value = store.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put { key, value } => {
            store.put(key.as_bytes(), value.as_bytes())?;
        }
        Commands::Size => {
            println!("{}", store.size()?);
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("segments:    {}", stats.segments);
            println!("total bytes: {}", stats.total_bytes);
            println!("records:     {}", stats.records);
            println!("live keys:   {}", stats.live_keys);
        }
        Commands::Merge { output_dir } => {
            let merged = store.merge_into(&output_dir)?;
            println!("{} ({} keys)", merged.path().display(), merged.len());
        }
        Commands::Compact => {
            let stats = store.compact()?;
            if stats.segments_merged == 0 {
                println!("nothing to compact");
            } else {
                println!(
                    "merged {} segments: {} -> {} bytes, {} keys",
                    stats.segments_merged, stats.bytes_before, stats.bytes_after, stats.keys
                );
            }
        }
    }
    Ok(())
}
