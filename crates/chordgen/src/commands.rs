//! CLI command implementations

use anyhow::{bail, Context, Result};
use chordchain::{extract_chords, generate as walk, Chord, GenerateOptions, MarkovModel};
use chordconf::ChordConfig;
use midi_io::ExportOptions;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::sources;

/// Resolution used when neither a source nor the model records one.
const DEFAULT_TICKS_PER_UNIT: u32 = 480;

/// One source file turned into chords.
struct Piece {
    path: PathBuf,
    ticks_per_unit: u32,
    tracks: usize,
    chords: Vec<Chord>,
}

fn read_piece(path: &Path, config: &ChordConfig) -> Result<Piece> {
    let stream =
        midi_io::read_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let chords = extract_chords(&stream, config.model.track_mode)
        .with_context(|| format!("Failed to extract chords from {}", path.display()))?;
    Ok(Piece {
        path: path.to_path_buf(),
        ticks_per_unit: stream.ticks_per_unit,
        tracks: stream.tracks.len(),
        chords,
    })
}

fn read_corpus(inputs: &[PathBuf], config: &ChordConfig) -> Result<Vec<Piece>> {
    sources::discover(inputs)?
        .iter()
        .map(|path| read_piece(path, config))
        .collect()
}

/// One `update` per piece, then a single normalization.
fn train_model(pieces: &[Piece], config: &ChordConfig) -> Result<MarkovModel> {
    let mut model = MarkovModel::new(config.model.order, config.model.keying)?;

    for piece in pieces {
        let transitions = model.update(&piece.chords).with_context(|| {
            format!("{} is too short to train on", piece.path.display())
        })?;
        info!(
            source = %piece.path.display(),
            chords = piece.chords.len(),
            transitions,
            "trained on piece"
        );
    }
    model.normalize()?;

    let stats = model.stats();
    info!(
        order = model.order(),
        keying = %model.key_mode(),
        note_contexts = stats.note_contexts,
        duration_contexts = stats.duration_contexts,
        observations = stats.observations,
        "model ready"
    );
    Ok(model)
}

/// Train (or load) a model, generate, and write the MIDI file.
pub fn generate(config: &ChordConfig, inputs: &[PathBuf], model_path: Option<&Path>) -> Result<()> {
    let model = match model_path {
        Some(path) => {
            let mut model = MarkovModel::load(path)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            if !model.is_normalized() {
                model.normalize()?;
            }
            model
        }
        None => train_model(&read_corpus(inputs, config)?, config)?,
    };
    // Every duration in the model is in its recorded resolution.
    let ticks_per_unit = model.ticks_per_unit().unwrap_or(DEFAULT_TICKS_PER_UNIT);

    let seed = config.generate.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let options = GenerateOptions {
        length: config.generate.length,
        ticks_per_unit: tpu_or_default(ticks_per_unit),
    };
    let policy = config.generate.policy.policy();
    let generated = walk(&model, &options, policy.as_ref(), &mut rng)?;

    if generated.fallback_steps > 0 {
        warn!(
            fallback_steps = generated.fallback_steps,
            "some windows were never seen in training"
        );
    }

    let export = ExportOptions {
        ticks_per_beat: u16::try_from(options.ticks_per_unit)
            .unwrap_or(DEFAULT_TICKS_PER_UNIT as u16),
        velocity: config.output.velocity,
        channel: config.output.channel,
        program: config.output.program,
        tempo_bpm: config.output.tempo_bpm,
        ..ExportOptions::default()
    };
    midi_io::write_file(&config.output.path, &generated.chords, &export)
        .with_context(|| format!("Failed to write {}", config.output.path.display()))?;

    info!(
        path = %config.output.path.display(),
        chords = generated.chords.len(),
        seed,
        policy = %config.generate.policy,
        "wrote generated piece"
    );
    Ok(())
}

fn tpu_or_default(ticks_per_unit: u32) -> u32 {
    if ticks_per_unit == 0 {
        DEFAULT_TICKS_PER_UNIT
    } else {
        ticks_per_unit
    }
}

pub fn train(config: &ChordConfig, inputs: &[PathBuf], output: &Path) -> Result<()> {
    let pieces = read_corpus(inputs, config)?;
    let model = train_model(&pieces, config)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    model
        .save(output)
        .with_context(|| format!("Failed to save model to {}", output.display()))?;
    info!(path = %output.display(), pieces = pieces.len(), "saved model");
    Ok(())
}

pub fn inspect(config: &ChordConfig, source: &Path, show_chords: bool) -> Result<()> {
    if !source.is_file() {
        bail!("source not found: {}", source.display());
    }
    let piece = read_piece(source, config)?;
    let notes: usize = piece.chords.iter().map(Chord::len).sum();

    info!(
        source = %piece.path.display(),
        tracks = piece.tracks,
        ticks_per_unit = piece.ticks_per_unit,
        notes,
        chords = piece.chords.len(),
        track_mode = %config.model.track_mode,
        "piece summary"
    );

    if show_chords {
        for (index, chord) in piece.chords.iter().enumerate() {
            info!(index, onset = %chord.onset(), "{chord}");
        }
    }

    let mut model = MarkovModel::new(config.model.order, config.model.keying)?;
    match model.update(&piece.chords) {
        Ok(transitions) => {
            let stats = model.stats();
            info!(
                order = model.order(),
                transitions,
                note_contexts = stats.note_contexts,
                note_transitions = stats.note_transitions,
                duration_contexts = stats.duration_contexts,
                duration_transitions = stats.duration_transitions,
                "chain statistics"
            );
        }
        Err(e) => warn!(error = %e, "piece cannot train a chain at this order"),
    }
    Ok(())
}
