//! chordgen - chord-level Markov chain generator
//!
//! Subcommands:
//! - `chordgen generate <sources>...` - Train on MIDI files and write a new piece
//! - `chordgen train <sources>... -o model.json` - Save a trained model
//! - `chordgen inspect <file>` - Log a piece's chords and chain statistics
//! - `chordgen config` - Print the effective configuration

use anyhow::{Context, Result};
use chordchain::{KeyMode, PolicyKind, TrackMode};
use chordconf::ChordConfig;
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod sources;

#[derive(Parser)]
#[command(name = "chordgen")]
#[command(about = "Train chord-level Markov chains on MIDI files and generate new pieces")]
#[command(version)]
struct Cli {
    /// Config file, loaded in place of ./chordchain.toml
    #[arg(long, global = true, env = "CHORDCHAIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that builds a model.
#[derive(Args, Debug, Clone, Default)]
struct ModelArgs {
    /// Chords of context per transition
    #[arg(short = 'k', long)]
    order: Option<usize>,

    /// Chord key ordering: raw or canonical
    #[arg(long)]
    keying: Option<KeyMode>,

    /// How tracks combine: merge or concatenate
    #[arg(long)]
    track_mode: Option<TrackMode>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on MIDI sources and write a generated piece
    Generate {
        /// MIDI files or directories
        #[arg(required_unless_present = "model")]
        sources: Vec<PathBuf>,

        /// Number of chords to generate
        #[arg(short = 'n', long)]
        length: Option<usize>,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Sampling policy: reference or backoff
        #[arg(long)]
        policy: Option<PolicyKind>,

        /// Use a model saved by `train` instead of sources
        #[arg(long, conflicts_with = "sources")]
        model: Option<PathBuf>,

        /// Output MIDI file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        model_args: ModelArgs,
    },

    /// Train on MIDI sources and save the normalized model as JSON
    Train {
        /// MIDI files or directories
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Model file to write
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        model_args: ModelArgs,
    },

    /// Log the chords of one MIDI file and the chain they produce
    Inspect {
        source: PathBuf,

        /// Log every chord
        #[arg(long)]
        chords: bool,

        #[command(flatten)]
        model_args: ModelArgs,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, config_sources) = ChordConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.telemetry.log_level);
    tracing::debug!(
        files = ?config_sources.files,
        env = ?config_sources.env_overrides,
        "configuration loaded"
    );

    match cli.command {
        Commands::Generate {
            sources,
            length,
            seed,
            policy,
            model,
            output,
            model_args,
        } => {
            model_args.apply(&mut config);
            if let Some(length) = length {
                config.generate.length = length;
            }
            if seed.is_some() {
                config.generate.seed = seed;
            }
            if let Some(policy) = policy {
                config.generate.policy = policy;
            }
            if let Some(output) = output {
                config.output.path = output;
            }
            commands::generate(&config, &sources, model.as_deref())?;
        }
        Commands::Train {
            sources,
            output,
            model_args,
        } => {
            model_args.apply(&mut config);
            commands::train(&config, &sources, &output)?;
        }
        Commands::Inspect {
            source,
            chords,
            model_args,
        } => {
            model_args.apply(&mut config);
            commands::inspect(&config, &source, chords)?;
        }
        Commands::Config => {
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}

impl ModelArgs {
    /// Flags win over config files and environment.
    fn apply(&self, config: &mut ChordConfig) {
        if let Some(order) = self.order {
            config.model.order = order;
        }
        if let Some(keying) = self.keying {
            config.model.keying = keying;
        }
        if let Some(track_mode) = self.track_mode {
            config.model.track_mode = track_mode;
        }
    }
}
