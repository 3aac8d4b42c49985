use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::normalize_events;
use crate::note::{Chord, EventStream};
use crate::segment::segment_chords;
use crate::Result;

/// How the tracks of a multi-track piece become one note sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMode {
    /// Interleave all tracks by onset so simultaneous notes on different
    /// tracks form one chord. Ties keep track order.
    #[default]
    Merge,
    /// Append each track's notes after the previous track's.
    Concatenate,
}

impl std::fmt::Display for TrackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackMode::Merge => write!(f, "merge"),
            TrackMode::Concatenate => write!(f, "concatenate"),
        }
    }
}

impl std::str::FromStr for TrackMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(TrackMode::Merge),
            "concatenate" | "concat" => Ok(TrackMode::Concatenate),
            other => Err(format!(
                "unknown track mode '{other}' (expected merge or concatenate)"
            )),
        }
    }
}

/// Normalize every track of `stream` and segment the result into chords.
pub fn extract_chords(stream: &EventStream, mode: TrackMode) -> Result<Vec<Chord>> {
    let mut notes = Vec::new();
    for track in &stream.tracks {
        notes.extend(normalize_events(track, stream.ticks_per_unit)?);
    }

    if mode == TrackMode::Merge {
        notes.sort_by_key(|n| n.onset().ticks());
    }

    let chords = segment_chords(&notes);
    debug!(
        tracks = stream.tracks.len(),
        notes = notes.len(),
        chords = chords.len(),
        %mode,
        "extracted chords"
    );
    Ok(chords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::TimedEvent;
    use crate::Error;
    use pretty_assertions::assert_eq;

    fn stream() -> EventStream {
        // Bass on one track, a triad on another, struck together at 0 and 480.
        let bass = vec![
            TimedEvent::note_start(36, 100, 0),
            TimedEvent::note_stop(36, 480),
            TimedEvent::note_start(43, 100, 0),
            TimedEvent::note_stop(43, 480),
        ];
        let upper = vec![
            TimedEvent::meta(0),
            TimedEvent::note_start(60, 80, 0),
            TimedEvent::note_start(64, 80, 0),
            TimedEvent::note_stop(60, 480),
            TimedEvent::note_stop(64, 0),
            TimedEvent::note_start(62, 80, 0),
            TimedEvent::note_stop(62, 480),
        ];
        EventStream {
            tracks: vec![bass, upper],
            ticks_per_unit: 480,
        }
    }

    fn pitch_sets(chords: &[Chord]) -> Vec<Vec<u8>> {
        chords.iter().map(|c| c.pitches().collect()).collect()
    }

    #[test]
    fn merge_joins_simultaneous_tracks() {
        let chords = extract_chords(&stream(), TrackMode::Merge).unwrap();
        assert_eq!(pitch_sets(&chords), vec![vec![36, 60, 64], vec![43, 62]]);
        assert_eq!(chords[1].onset().ticks(), 480);
    }

    #[test]
    fn concatenate_keeps_tracks_apart() {
        let chords = extract_chords(&stream(), TrackMode::Concatenate).unwrap();
        assert_eq!(
            pitch_sets(&chords),
            vec![vec![36], vec![43], vec![60, 64], vec![62]]
        );
    }

    #[test]
    fn empty_stream_has_no_chords() {
        let stream = EventStream {
            tracks: vec![vec![TimedEvent::meta(0)]],
            ticks_per_unit: 96,
        };
        assert!(extract_chords(&stream, TrackMode::Merge).unwrap().is_empty());
    }

    #[test]
    fn zero_resolution_is_an_error() {
        let stream = EventStream {
            tracks: vec![],
            ticks_per_unit: 0,
        };
        // No tracks means nothing to normalize, so nothing fails.
        assert!(extract_chords(&stream, TrackMode::Merge).unwrap().is_empty());

        let stream = EventStream {
            tracks: vec![vec![TimedEvent::note_start(60, 1, 0)]],
            ticks_per_unit: 0,
        };
        assert!(matches!(
            extract_chords(&stream, TrackMode::Merge),
            Err(Error::InvalidTicksPerUnit)
        ));
    }

    #[test]
    fn track_mode_parses() {
        assert_eq!("concat".parse::<TrackMode>().unwrap(), TrackMode::Concatenate);
        assert_eq!(TrackMode::default().to_string(), "merge");
    }
}
