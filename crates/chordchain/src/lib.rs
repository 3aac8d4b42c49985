//! Chord-level Markov chains over performed music.
//!
//! The pipeline runs leaf-first:
//!
//! 1. [`normalize`] pairs note-start/note-stop events into [`Note`]s.
//! 2. [`segment`] groups notes sharing an onset into [`Chord`]s.
//! 3. [`keys`] encodes chords and windows of chords into string keys.
//! 4. [`markov`] counts "window -> next chord" transitions in two parallel
//!    chains (pitch sets and mean durations) and normalizes them.
//! 5. [`generate`] walks the trained chains to produce new chords.
//!
//! The crate never reads or writes bytes; `midi-io` owns the file format.
//!
//! # Example
//!
//! ```
//! use chordchain::{
//!     extract_chords, generate, EventStream, GenerateOptions, KeyMode, MarkovModel,
//!     ReferencePolicy, TimedEvent, TrackMode,
//! };
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut track = Vec::new();
//! for pitch in [60u8, 62, 64, 65, 67, 65, 64, 62] {
//!     track.push(TimedEvent::note_start(pitch, 90, 0));
//!     track.push(TimedEvent::note_stop(pitch, 240));
//! }
//! let stream = EventStream { tracks: vec![track], ticks_per_unit: 480 };
//!
//! let chords = extract_chords(&stream, TrackMode::Merge).unwrap();
//! let mut model = MarkovModel::new(2, KeyMode::Raw).unwrap();
//! model.update(&chords).unwrap();
//! model.normalize().unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let options = GenerateOptions { length: 16, ticks_per_unit: 480 };
//! let generated = generate(&model, &options, &ReferencePolicy, &mut rng).unwrap();
//! assert_eq!(generated.chords.len(), 16);
//! ```

pub mod generate;
pub mod keys;
pub mod markov;
pub mod normalize;
pub mod note;
pub mod pipeline;
pub mod segment;

pub use generate::{
    generate, BackoffPolicy, GenerateOptions, Generated, PolicyKind, ReferencePolicy,
    SamplingPolicy, SeedWindow, Transition,
};
pub use keys::{
    chord_duration_key, chord_duration_key_at, chord_key, key_to_chord, window_key, window_key_at,
    ContextKey, KeyMode,
};
pub use markov::{Chain, MarkovModel, ModelState, ModelStats};
pub use normalize::normalize_events;
pub use note::{Chord, EventKind, EventStream, Note, Onset, TimedEvent};
pub use pipeline::{extract_chords, TrackMode};
pub use segment::{segment_chords, ChordSegments};

/// Errors from chord extraction, training and generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("an order-{order} chain needs at least {needed} chords, got {got}")]
    EmptyChordSequence {
        order: usize,
        needed: usize,
        got: usize,
    },

    #[error("model has already been normalized")]
    ModelAlreadyNormalized,

    #[error("model must be normalized before generating")]
    ModelNotNormalized,

    #[error("model has no observations")]
    EmptyModel,

    #[error("chain order must be at least 1")]
    InvalidOrder,

    #[error("ticks per unit must be nonzero")]
    InvalidTicksPerUnit,

    #[error("malformed key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("cannot sample from context {context:?}: {reason}")]
    InvalidDistribution { context: String, reason: String },

    #[error("model file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
