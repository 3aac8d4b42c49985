use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroU32;

/// What a timed event does to the note state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteStart,
    NoteStop,
    Other,
}

/// One event of a track, timed relative to the previous event.
///
/// A `NoteStart` with velocity 0 acts as a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
    /// Ticks since the previous event in the same track.
    pub delta: u32,
    pub is_meta: bool,
}

impl TimedEvent {
    pub fn note_start(pitch: u8, velocity: u8, delta: u32) -> Self {
        Self {
            kind: EventKind::NoteStart,
            pitch,
            velocity,
            delta,
            is_meta: false,
        }
    }

    pub fn note_stop(pitch: u8, delta: u32) -> Self {
        Self {
            kind: EventKind::NoteStop,
            pitch,
            velocity: 0,
            delta,
            is_meta: false,
        }
    }

    /// A non-note channel event (program change, controller, ...).
    pub fn other(delta: u32) -> Self {
        Self {
            kind: EventKind::Other,
            pitch: 0,
            velocity: 0,
            delta,
            is_meta: false,
        }
    }

    /// A meta or sysex event. Only its delta matters.
    pub fn meta(delta: u32) -> Self {
        Self {
            kind: EventKind::Other,
            pitch: 0,
            velocity: 0,
            delta,
            is_meta: true,
        }
    }

    pub fn is_start(&self) -> bool {
        !self.is_meta && self.kind == EventKind::NoteStart && self.velocity > 0
    }

    pub fn is_stop(&self) -> bool {
        !self.is_meta
            && (self.kind == EventKind::NoteStop
                || (self.kind == EventKind::NoteStart && self.velocity == 0))
    }
}

/// A whole piece as handed over by the event-stream reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStream {
    pub tracks: Vec<Vec<TimedEvent>>,
    pub ticks_per_unit: u32,
}

/// Rational time: `ticks / ticks_per_unit`.
///
/// Comparisons cross-multiply, so two onsets are equal only when they denote
/// exactly the same instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Onset {
    ticks: u64,
    ticks_per_unit: NonZeroU32,
}

impl Onset {
    pub fn new(ticks: u64, ticks_per_unit: NonZeroU32) -> Self {
        Self {
            ticks,
            ticks_per_unit,
        }
    }

    pub fn zero(ticks_per_unit: NonZeroU32) -> Self {
        Self::new(0, ticks_per_unit)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ticks_per_unit(&self) -> NonZeroU32 {
        self.ticks_per_unit
    }

    /// The onset in units, for display.
    pub fn as_units(&self) -> f64 {
        self.ticks as f64 / self.ticks_per_unit.get() as f64
    }

    /// Same resolution, `ticks` later. Saturates at `u64::MAX`.
    pub fn advance(self, ticks: u64) -> Self {
        Self::new(self.ticks.saturating_add(ticks), self.ticks_per_unit)
    }

    /// Rescale to another resolution, rounding down.
    pub fn to_ticks_at(&self, resolution: u32) -> u64 {
        rescale_ticks(self.ticks, self.ticks_per_unit.get(), resolution)
    }

    fn cross(&self, other: &Self) -> (u128, u128) {
        (
            self.ticks as u128 * other.ticks_per_unit.get() as u128,
            other.ticks as u128 * self.ticks_per_unit.get() as u128,
        )
    }
}

/// Convert a tick count between resolutions, rounding down and saturating.
pub fn rescale_ticks(ticks: u64, from: u32, to: u32) -> u64 {
    if from == to || from == 0 {
        return ticks;
    }
    u64::try_from(ticks as u128 * to as u128 / from as u128).unwrap_or(u64::MAX)
}

impl PartialEq for Onset {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for Onset {}

impl PartialOrd for Onset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Onset {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(other);
        a.cmp(&b)
    }
}

impl fmt::Display for Onset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_units())
    }
}

/// A single sounding note. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pitch: u8,
    duration: u64,
    onset: Onset,
}

impl Note {
    pub fn new(pitch: u8, duration: u64, onset: Onset) -> Self {
        Self {
            pitch,
            duration,
            onset,
        }
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    /// Length in ticks.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn onset(&self) -> Onset {
        self.onset
    }
}

/// Notes sharing one onset, in the order they were discovered.
///
/// Never empty. Built only by the chord segmenter or by decoding a chord key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    notes: Vec<Note>,
}

impl Chord {
    pub(crate) fn from_notes(notes: Vec<Note>) -> Self {
        debug_assert!(!notes.is_empty(), "a chord needs at least one note");
        Self { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn onset(&self) -> Onset {
        self.notes[0].onset
    }

    pub fn pitches(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.iter().map(|n| n.pitch)
    }

    /// Floor of the mean note duration.
    pub fn mean_duration(&self) -> u64 {
        let total: u128 = self.notes.iter().map(|n| u128::from(n.duration)).sum();
        (total / self.notes.len() as u128) as u64
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} notes", self.notes.len())?;
        for note in &self.notes {
            write!(f, " | {}, {}, {}", note.pitch, note.duration, note.onset)?;
        }
        write!(f, " |")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tpu(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn onsets_compare_across_resolutions() {
        let a = Onset::new(240, tpu(480));
        let b = Onset::new(48, tpu(96));
        let c = Onset::new(49, tpu(96));
        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(a.as_units(), 0.5);
    }

    #[test]
    fn onset_rescales() {
        let onset = Onset::new(960, tpu(480));
        assert_eq!(onset.to_ticks_at(96), 192);
        assert_eq!(onset.advance(480).ticks(), 1440);
    }

    #[test]
    fn huge_durations_saturate() {
        let onset = Onset::new(u64::MAX - 10, tpu(480));
        assert_eq!(onset.advance(u64::MAX).ticks(), u64::MAX);
        assert_eq!(rescale_ticks(u64::MAX, 96, 480), u64::MAX);

        let chord = Chord::from_notes(vec![
            Note::new(60, u64::MAX, onset),
            Note::new(64, u64::MAX, onset),
        ]);
        assert_eq!(chord.mean_duration(), u64::MAX);
    }

    #[test]
    fn zero_velocity_start_is_a_stop() {
        let ev = TimedEvent::note_start(60, 0, 10);
        assert!(ev.is_stop());
        assert!(!ev.is_start());
        assert!(TimedEvent::note_start(60, 1, 0).is_start());
    }

    #[test]
    fn meta_events_never_pair() {
        let mut ev = TimedEvent::note_stop(60, 0);
        ev.is_meta = true;
        assert!(!ev.is_stop());
    }

    #[test]
    fn mean_duration_floors() {
        let onset = Onset::zero(tpu(1));
        let chord = Chord::from_notes(vec![
            Note::new(60, 3, onset),
            Note::new(64, 4, onset),
        ]);
        assert_eq!(chord.mean_duration(), 3);
        assert_eq!(chord.pitches().collect::<Vec<_>>(), vec![60, 64]);
    }
}
