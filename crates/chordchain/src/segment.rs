use crate::note::{Chord, Note};

/// Lazy left-to-right grouping of notes into chords.
///
/// A chord takes the current note plus every immediately following note whose
/// onset is exactly equal to it. Notes are never reordered, so two notes with
/// the same onset separated by a different onset land in different chords.
#[derive(Debug, Clone)]
pub struct ChordSegments<'a> {
    notes: &'a [Note],
    pos: usize,
}

impl<'a> ChordSegments<'a> {
    pub fn new(notes: &'a [Note]) -> Self {
        Self { notes, pos: 0 }
    }
}

impl Iterator for ChordSegments<'_> {
    type Item = Chord;

    fn next(&mut self) -> Option<Chord> {
        let first = self.notes.get(self.pos)?;
        let len = self.notes[self.pos..]
            .iter()
            .take_while(|n| n.onset() == first.onset())
            .count();
        let chord = Chord::from_notes(self.notes[self.pos..self.pos + len].to_vec());
        self.pos += len;
        Some(chord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.notes.len() - self.pos;
        (usize::from(remaining > 0), Some(remaining))
    }
}

/// Collect [`ChordSegments`] into a vector.
pub fn segment_chords(notes: &[Note]) -> Vec<Chord> {
    ChordSegments::new(notes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Onset;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroU32;

    fn note(pitch: u8, onset: u64) -> Note {
        Note::new(pitch, 1, Onset::new(onset, NonZeroU32::MIN))
    }

    #[test]
    fn groups_equal_onsets() {
        let notes: Vec<Note> = [0, 0, 1, 1, 1, 2]
            .iter()
            .enumerate()
            .map(|(i, &t)| note(60 + i as u8, t))
            .collect();
        let sizes: Vec<usize> = segment_chords(&notes).iter().map(Chord::len).collect();
        assert_eq!(sizes, vec![2, 3, 1]);
    }

    #[test]
    fn keeps_discovery_order() {
        let notes = vec![note(67, 0), note(60, 0), note(64, 0)];
        let chords = segment_chords(&notes);
        assert_eq!(chords.len(), 1);
        assert_eq!(chords[0].pitches().collect::<Vec<_>>(), vec![67, 60, 64]);
    }

    #[test]
    fn only_adjacent_notes_merge() {
        let notes = vec![note(60, 0), note(62, 1), note(64, 0)];
        let sizes: Vec<usize> = segment_chords(&notes).iter().map(Chord::len).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(segment_chords(&[]).is_empty());
    }

    #[test]
    fn iterator_is_lazy() {
        let notes = vec![note(60, 0), note(62, 1), note(64, 2)];
        let mut segments = ChordSegments::new(&notes);
        assert_eq!(segments.next().map(|c| c.onset().ticks()), Some(0));
        assert_eq!(segments.size_hint(), (1, Some(2)));
    }
}
