//! String keys for chords and chord windows.
//!
//! A chord's pitch key is its pitches joined by [`NOTE_DELIMITER`]; its
//! duration key is the floored mean note duration. A window of chords joins the
//! per-chord keys with [`CHORD_DELIMITER`], once for pitches and once for
//! durations, so both keys always cover the same chords.

use serde::{Deserialize, Serialize};

use crate::note::{rescale_ticks, Chord, Note, Onset};
use crate::{Error, Result};

pub const NOTE_DELIMITER: char = ',';
pub const CHORD_DELIMITER: char = ':';

/// How a chord's pitches are ordered inside its key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// Discovery order. The same pitches found in a different order give a
    /// different key, which keeps voicing but splits contexts.
    #[default]
    Raw,
    /// Ascending pitch order.
    Canonical,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Raw => write!(f, "raw"),
            KeyMode::Canonical => write!(f, "canonical"),
        }
    }
}

impl std::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(KeyMode::Raw),
            "canonical" | "sorted" => Ok(KeyMode::Canonical),
            other => Err(format!("unknown key mode '{other}' (expected raw or canonical)")),
        }
    }
}

/// Pitch and duration keys over the same window of chords.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey {
    pub notes: String,
    pub durations: String,
}

pub fn chord_key(chord: &Chord, mode: KeyMode) -> String {
    let mut pitches: Vec<u8> = chord.pitches().collect();
    if mode == KeyMode::Canonical {
        pitches.sort_unstable();
    }
    pitches
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(NOTE_DELIMITER.to_string().as_str())
}

pub fn chord_duration_key(chord: &Chord) -> String {
    chord.mean_duration().to_string()
}

/// Duration key with the mean duration expressed at `resolution` ticks per
/// unit instead of the chord's own resolution.
pub fn chord_duration_key_at(chord: &Chord, resolution: u32) -> String {
    let from = chord.onset().ticks_per_unit().get();
    rescale_ticks(chord.mean_duration(), from, resolution).to_string()
}

pub fn window_key(chords: &[Chord], mode: KeyMode) -> ContextKey {
    build_window_key(chords, mode, chord_duration_key)
}

/// [`window_key`] with durations rescaled to `resolution`.
pub fn window_key_at(chords: &[Chord], mode: KeyMode, resolution: u32) -> ContextKey {
    build_window_key(chords, mode, |chord| chord_duration_key_at(chord, resolution))
}

fn build_window_key<F>(chords: &[Chord], mode: KeyMode, duration_key: F) -> ContextKey
where
    F: Fn(&Chord) -> String,
{
    let delimiter = CHORD_DELIMITER.to_string();
    ContextKey {
        notes: chords
            .iter()
            .map(|c| chord_key(c, mode))
            .collect::<Vec<_>>()
            .join(delimiter.as_str()),
        durations: chords
            .iter()
            .map(duration_key)
            .collect::<Vec<_>>()
            .join(delimiter.as_str()),
    }
}

/// Split a context key into its per-chord tokens.
pub fn context_tokens(key: &str) -> impl DoubleEndedIterator<Item = &str> {
    key.split(CHORD_DELIMITER)
}

/// The token of the most recent chord in a context key.
pub fn last_token(key: &str) -> &str {
    key.rsplit(CHORD_DELIMITER).next().unwrap_or(key)
}

/// Rebuild a chord from its pitch key.
///
/// Every note gets the same `duration` and `onset`; per-note durations are not
/// part of the key.
pub fn key_to_chord(key: &str, duration: u64, onset: Onset) -> Result<Chord> {
    let notes = key
        .split(NOTE_DELIMITER)
        .map(|token| parse_pitch(key, token).map(|pitch| Note::new(pitch, duration, onset)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Chord::from_notes(notes))
}

pub fn parse_duration_token(token: &str) -> Result<u64> {
    token.parse().map_err(|_| Error::MalformedKey {
        key: token.to_string(),
        reason: "duration token is not an unsigned integer".to_string(),
    })
}

fn parse_pitch(key: &str, token: &str) -> Result<u8> {
    let malformed = |reason: &str| Error::MalformedKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let pitch: u8 = token
        .parse()
        .map_err(|_| malformed(&format!("pitch token {token:?} is not a number")))?;
    if pitch > 127 {
        return Err(malformed(&format!("pitch {pitch} is out of range")));
    }
    Ok(pitch)
}
