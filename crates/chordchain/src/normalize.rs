use std::num::NonZeroU32;

use tracing::debug;

use crate::note::{Note, Onset, TimedEvent};
use crate::{Error, Result};

/// Pair note starts with note stops and emit one [`Note`] per matched start.
///
/// Deltas of every event (meta and non-note events included) advance an
/// absolute tick clock. Each nonzero-velocity start, taken in stream order,
/// claims the first later stop for the same pitch that no earlier start has
/// claimed. Pairing is local and greedy: overlapping notes of one pitch can be
/// mis-paired, and a start that finds no free stop is dropped.
///
/// Notes come out in start order, so onsets never decrease.
pub fn normalize_events(events: &[TimedEvent], ticks_per_unit: u32) -> Result<Vec<Note>> {
    let ticks_per_unit = NonZeroU32::new(ticks_per_unit).ok_or(Error::InvalidTicksPerUnit)?;

    let mut clock: u64 = 0;
    let absolute: Vec<u64> = events
        .iter()
        .map(|event| {
            clock += event.delta as u64;
            clock
        })
        .collect();

    let mut claimed = vec![false; events.len()];
    let mut notes = Vec::new();
    let mut unmatched = 0usize;

    for (i, start) in events.iter().enumerate() {
        if !start.is_start() {
            continue;
        }

        let stop = (i + 1..events.len()).find(|&j| {
            !claimed[j] && events[j].is_stop() && events[j].pitch == start.pitch
        });

        match stop {
            Some(j) => {
                claimed[j] = true;
                notes.push(Note::new(
                    start.pitch,
                    absolute[j] - absolute[i],
                    Onset::new(absolute[i], ticks_per_unit),
                ));
            }
            None => unmatched += 1,
        }
    }

    if unmatched > 0 {
        debug!(unmatched, "dropped note starts without a matching stop");
    }

    Ok(notes)
}
