use chordchain::note::rescale_ticks;
use chordchain::Chord;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{Error, Result};

/// Options for chord export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// File resolution. Chord timings are rescaled to it. Default: 480.
    pub ticks_per_beat: u16,
    /// Note-on velocity for every note. Default: 100.
    pub velocity: u8,
    pub channel: u8,
    /// General MIDI program. Default: 0 (piano).
    pub program: u8,
    pub tempo_bpm: f64,
    pub track_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            ticks_per_beat: 480,
            velocity: 100,
            channel: 0,
            program: 0,
            tempo_bpm: 120.0,
            track_name: "chordchain".to_string(),
        }
    }
}

/// Write chords to Standard MIDI File format 1 bytes.
///
/// Track 0: tempo.
/// Track 1: track name, program change, centered pan, then the notes.
pub fn chords_to_midi(chords: &[Chord], options: &ExportOptions) -> Vec<u8> {
    let tracks = vec![build_tempo_track(options.tempo_bpm), build_chord_track(chords, options)];
    build_midi_file(options.ticks_per_beat, &tracks)
}

pub fn write_file(path: &Path, chords: &[Chord], options: &ExportOptions) -> Result<()> {
    let io_error = |source| Error::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let bytes = chords_to_midi(chords, options);
    std::fs::write(path, &bytes).map_err(io_error)?;
    debug!(path = %path.display(), chords = chords.len(), bytes = bytes.len(), "wrote MIDI file");
    Ok(())
}

fn build_tempo_track(bpm: f64) -> Vec<u8> {
    let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { 120.0 };
    let usec = (60_000_000.0 / bpm).round().clamp(1.0, 0xFF_FFFF as f64) as u32;

    let mut track_data = Vec::new();
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

fn build_chord_track(chords: &[Chord], options: &ExportOptions) -> Vec<u8> {
    let channel = options.channel & 0x0F;
    let velocity = options.velocity.min(127);
    let resolution = u32::from(options.ticks_per_beat);
    let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

    let name_bytes = options.track_name.as_bytes();
    let mut name_event = vec![0xFF, 0x03];
    write_vlq(&mut name_event, name_bytes.len() as u32);
    name_event.extend_from_slice(name_bytes);
    events.push((0, name_event));

    events.push((0, vec![0xC0 | channel, options.program & 0x7F]));
    // CC10 pan, centered
    events.push((0, vec![0xB0 | channel, 10, 64]));

    for chord in chords {
        for note in chord.notes() {
            let from = note.onset().ticks_per_unit().get();
            let onset = note.onset().to_ticks_at(resolution);
            let duration = rescale_ticks(note.duration(), from, resolution);
            events.push((onset, vec![0x90 | channel, note.pitch(), velocity]));
            events.push((
                onset.saturating_add(duration),
                vec![0x80 | channel, note.pitch(), 0],
            ));
        }
    }

    // Sort by tick, with note-offs before note-ons at the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            b_is_off.cmp(&a_is_off)
        })
    });

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;

    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta.min(0x0FFF_FFFF) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
