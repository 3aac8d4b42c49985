//! Standard MIDI File boundary for `chordchain`.
//!
//! [`read_events`] turns SMF bytes into an [`chordchain::EventStream`];
//! [`chords_to_midi`] writes generated chords back out as a format-1 file.

pub mod reader;
pub mod writer;

pub use reader::{read_events, read_file};
pub use writer::{chords_to_midi, write_file, ExportOptions};

/// Errors from MIDI reading and writing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
