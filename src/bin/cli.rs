//! CinderKV CLI
//!
//! Command-line interface over an embedded CinderKV data directory.

use std::path::PathBuf;
use std::process::ExitCode;

use cinderkv::memtable::ValueType;
use cinderkv::wal::WalRecovery;
use cinderkv::{Config, Engine, Status};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CinderKV CLI
#[derive(Parser, Debug)]
#[command(name = "cinderkv-cli")]
#[command(about = "CLI for the CinderKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./cinderkv_data")]
    data_dir: PathBuf,

    /// Sync the WAL after every write
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

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print every memtable entry in internal key order
    Scan,

    /// Check the WAL for corruption without applying it
    VerifyWal,
}

fn main() -> ExitCode {
    // Logs go to stderr so command output stays clean on stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cinderkv=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let status = Status::from(&e);
            tracing::error!(code = status.code(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> cinderkv::Result<()> {
    let mut builder = Config::builder().data_dir(&args.data_dir);
    if args.sync {
        builder = builder.wal_sync_strategy(cinderkv::config::WalSyncStrategy::EveryWrite);
    }
    let config = builder.build();

    if let Commands::VerifyWal = args.command {
        let result = WalRecovery::verify(&config.data_dir.join("wal.log"))?;
        println!("records:           {}", result.records_recovered);
        println!("corruption events: {}", result.corruption_events);
        println!("bytes dropped:     {}", result.bytes_dropped);
        println!("last sequence:     {}", result.last_sequence);
        println!("intact bytes:      {}", result.valid_len);
        return Ok(());
    }

    let engine = Engine::open(config)?;
    match args.command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            let sequence = engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK (seq {})", sequence);
        }
        Commands::Del { key } => {
            let sequence = engine.delete(key.as_bytes())?;
            println!("OK (seq {})", sequence);
        }
        Commands::Scan => {
            let memtable = engine.memtable();
            let mut iter = memtable.iter();
            iter.seek_to_first();
            while iter.valid() {
                let parsed = iter.parsed_key();
                match parsed.value_type {
                    ValueType::Value => println!(
                        "{} => {}",
                        parsed,
                        String::from_utf8_lossy(iter.value())
                    ),
                    ValueType::Deletion => println!("{} => (deleted)", parsed),
                }
                iter.next();
            }
        }
        Commands::VerifyWal => unreachable!("handled before opening the engine"),
    }
    engine.close()
}
