//! Order-k Markov model over chord windows.
//!
//! Two chains share the same windowing: one maps a window's pitch key to the
//! next chord's pitch key, the other maps the window's duration key to the
//! next chord's duration key. Counts accumulate across any number of
//! [`MarkovModel::update`] calls (one per piece) and are turned into
//! probabilities exactly once by [`MarkovModel::normalize`].
//!
//! The first piece fixes the model's resolution. Durations of later pieces
//! are rescaled to it, so one beat gets one duration token across a corpus.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::keys::{chord_duration_key_at, chord_key, window_key_at, KeyMode};
use crate::note::Chord;
use crate::{Error, Result};

/// Context key -> next key -> count (training) or probability (normalized).
///
/// Ordered maps keep sampling reproducible for a seeded RNG.
pub type Chain = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Training,
    Normalized,
}

/// Summary counts for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub note_contexts: usize,
    pub note_transitions: usize,
    pub duration_contexts: usize,
    pub duration_transitions: usize,
    pub observations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkovModel {
    order: usize,
    key_mode: KeyMode,
    state: ModelState,
    observations: u64,
    /// Resolution of the durations stored in the duration chain.
    #[serde(default)]
    ticks_per_unit: Option<u32>,
    note_chain: Chain,
    duration_chain: Chain,
    /// (pitch context, duration context) pairs seen on the same window.
    paired_contexts: BTreeSet<(String, String)>,
}

impl MarkovModel {
    pub fn new(order: usize, key_mode: KeyMode) -> Result<Self> {
        if order == 0 {
            return Err(Error::InvalidOrder);
        }
        Ok(Self {
            order,
            key_mode,
            state: ModelState::Training,
            observations: 0,
            ticks_per_unit: None,
            note_chain: Chain::new(),
            duration_chain: Chain::new(),
            paired_contexts: BTreeSet::new(),
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_normalized(&self) -> bool {
        self.state == ModelState::Normalized
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn ticks_per_unit(&self) -> Option<u32> {
        self.ticks_per_unit
    }

    pub fn note_chain(&self) -> &Chain {
        &self.note_chain
    }

    pub fn duration_chain(&self) -> &Chain {
        &self.duration_chain
    }

    pub fn paired_contexts(&self) -> &BTreeSet<(String, String)> {
        &self.paired_contexts
    }

    /// Count every "window -> next chord" transition in `chords`.
    ///
    /// Returns the number of transitions recorded. The model is left untouched
    /// when `chords` is too short to form a single window plus successor.
    pub fn update(&mut self, chords: &[Chord]) -> Result<usize> {
        if self.is_normalized() {
            return Err(Error::ModelAlreadyNormalized);
        }
        let needed = self.order + 1;
        if chords.len() < needed {
            return Err(Error::EmptyChordSequence {
                order: self.order,
                needed,
                got: chords.len(),
            });
        }

        let piece_resolution = chords[0].onset().ticks_per_unit().get();
        let resolution = *self.ticks_per_unit.get_or_insert(piece_resolution);
        if piece_resolution != resolution {
            debug!(
                from = piece_resolution,
                to = resolution,
                "rescaling piece durations"
            );
        }

        for i in self.order..chords.len() {
            let context = window_key_at(&chords[i - self.order..i], self.key_mode, resolution);
            let current = &chords[i];

            bump(
                &mut self.note_chain,
                &context.notes,
                chord_key(current, self.key_mode),
            );
            bump(
                &mut self.duration_chain,
                &context.durations,
                chord_duration_key_at(current, resolution),
            );
            self.paired_contexts
                .insert((context.notes, context.durations));
        }

        let transitions = chords.len() - self.order;
        self.observations += transitions as u64;
        debug!(
            transitions,
            total = self.observations,
            note_contexts = self.note_chain.len(),
            "updated chord chain"
        );
        Ok(transitions)
    }

    /// Turn counts into probabilities. Allowed once.
    pub fn normalize(&mut self) -> Result<()> {
        if self.is_normalized() {
            return Err(Error::ModelAlreadyNormalized);
        }
        if self.observations == 0 {
            return Err(Error::EmptyModel);
        }

        normalize_chain(&mut self.note_chain);
        normalize_chain(&mut self.duration_chain);
        self.state = ModelState::Normalized;
        Ok(())
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            note_contexts: self.note_chain.len(),
            note_transitions: self.note_chain.values().map(BTreeMap::len).sum(),
            duration_contexts: self.duration_chain.len(),
            duration_transitions: self.duration_chain.values().map(BTreeMap::len).sum(),
            observations: self.observations,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let model: MarkovModel = serde_json::from_str(&data)?;
        if model.order == 0 {
            return Err(Error::InvalidOrder);
        }
        Ok(model)
    }
}

fn bump(chain: &mut Chain, context: &str, next: String) {
    *chain
        .entry(context.to_string())
        .or_default()
        .entry(next)
        .or_insert(0.0) += 1.0;
}

fn normalize_chain(chain: &mut Chain) {
    for distribution in chain.values_mut() {
        let total: f64 = distribution.values().sum();
        for weight in distribution.values_mut() {
            *weight /= total;
        }
    }
}
