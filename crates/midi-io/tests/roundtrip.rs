use chordchain::{chord_key, extract_chords, KeyMode, TrackMode};
use midi_io::{chords_to_midi, read_events, ExportOptions};
use pretty_assertions::assert_eq;

fn summary(bytes: &[u8]) -> Vec<(String, u64, u64)> {
    let stream = read_events(bytes).unwrap();
    extract_chords(&stream, TrackMode::Merge)
        .unwrap()
        .iter()
        .map(|c| {
            (
                chord_key(c, KeyMode::Canonical),
                c.onset().ticks(),
                c.mean_duration(),
            )
        })
        .collect()
}

#[test]
fn exported_chords_read_back_unchanged() {
    let mut track = Vec::new();
    for chord in [&[48u8, 55, 64][..], &[50, 57, 65], &[43, 62, 67], &[48, 55, 64]] {
        for &pitch in chord {
            track.push(chordchain::TimedEvent::note_start(pitch, 90, 0));
        }
        for (i, &pitch) in chord.iter().enumerate() {
            track.push(chordchain::TimedEvent::note_stop(pitch, if i == 0 { 240 } else { 0 }));
        }
    }
    let stream = chordchain::EventStream {
        tracks: vec![track],
        ticks_per_unit: 240,
    };
    let chords = extract_chords(&stream, TrackMode::Merge).unwrap();

    let options = ExportOptions {
        ticks_per_beat: 240,
        ..ExportOptions::default()
    };
    let first = chords_to_midi(&chords, &options);
    let summary_first = summary(&first);

    assert_eq!(summary_first.len(), 4);
    assert_eq!(summary_first[0], ("48,55,64".to_string(), 0, 240));
    assert_eq!(summary_first[3].1, 720);

    let reread = extract_chords(&read_events(&first).unwrap(), TrackMode::Merge).unwrap();
    assert_eq!(summary(&chords_to_midi(&reread, &options)), summary_first);
}
