use chordchain::{EventStream, TimedEvent};
use midly::{MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;
use tracing::debug;

use crate::{Error, Result};

/// Resolution assumed for SMPTE-timed files, which carry no PPQ.
pub const FALLBACK_PPQ: u32 = 480;

/// Parse SMF bytes into one event list per track.
///
/// Every event keeps its delta so the normalizer's clock matches the file's.
pub fn read_events(bytes: &[u8]) -> Result<EventStream> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let ticks_per_unit = match smf.header.timing {
        Timing::Metrical(ticks) => u32::from(ticks.as_int()),
        Timing::Timecode(_, _) => FALLBACK_PPQ,
    };

    let tracks: Vec<Vec<TimedEvent>> = smf
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .map(|event| {
                    let delta = event.delta.as_int();
                    match event.kind {
                        TrackEventKind::Midi { message, .. } => match message {
                            MidiMessage::NoteOn { key, vel } => {
                                TimedEvent::note_start(key.as_int(), vel.as_int(), delta)
                            }
                            MidiMessage::NoteOff { key, .. } => {
                                TimedEvent::note_stop(key.as_int(), delta)
                            }
                            _ => TimedEvent::other(delta),
                        },
                        TrackEventKind::Meta(_)
                        | TrackEventKind::SysEx(_)
                        | TrackEventKind::Escape(_) => TimedEvent::meta(delta),
                    }
                })
                .collect()
        })
        .collect();

    debug!(
        tracks = tracks.len(),
        ticks_per_unit, "parsed MIDI event stream"
    );
    Ok(EventStream {
        tracks,
        ticks_per_unit,
    })
}

pub fn read_file(path: &Path) -> Result<EventStream> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_events(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordchain::EventKind;
    use pretty_assertions::assert_eq;

    fn smf(division: [u8; 2], tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        buf.extend_from_slice(&division);
        for track in tracks {
            buf.extend_from_slice(b"MTrk");
            buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
            buf.extend_from_slice(track);
        }
        buf
    }

    fn melody() -> Vec<u8> {
        let mut track = Vec::new();
        // Program change, then C4 and E4 for 480 ticks each.
        track.extend_from_slice(&[0x00, 0xC0, 0x00]);
        track.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track.extend_from_slice(&[0x83, 0x60, 0x80, 60, 0]);
        track.extend_from_slice(&[0x00, 0x90, 64, 100]);
        // Zero-velocity note-on as the stop.
        track.extend_from_slice(&[0x83, 0x60, 0x90, 64, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        track
    }

    #[test]
    fn maps_channel_and_meta_events() {
        let tempo = vec![
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, 0x00, 0xFF, 0x2F, 0x00,
        ];
        let bytes = smf(480u16.to_be_bytes(), &[tempo, melody()]);
        let stream = read_events(&bytes).unwrap();

        assert_eq!(stream.ticks_per_unit, 480);
        assert_eq!(stream.tracks.len(), 2);
        assert!(stream.tracks[0].iter().all(|e| e.is_meta));

        let kinds: Vec<EventKind> = stream.tracks[1].iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Other,
                EventKind::NoteStart,
                EventKind::NoteStop,
                EventKind::NoteStart,
                EventKind::NoteStart,
                EventKind::Other,
            ]
        );
        assert!(stream.tracks[1][4].is_stop());
        assert_eq!(stream.tracks[1][2].delta, 480);
    }

    #[test]
    fn timecode_files_use_fallback_resolution() {
        // -25 fps, 40 subframes.
        let bytes = smf([0xE7, 0x28], &[melody()]);
        let stream = read_events(&bytes).unwrap();
        assert_eq!(stream.ticks_per_unit, FALLBACK_PPQ);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = read_events(b"not a midi file").unwrap_err();
        assert!(matches!(err, Error::MidiParse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("absent.mid")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
