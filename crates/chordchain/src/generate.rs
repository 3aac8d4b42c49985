//! Random walk over a trained [`MarkovModel`].
//!
//! Where the walk starts and what happens when the current window was never
//! seen in training are decided by a [`SamplingPolicy`]. [`ReferencePolicy`]
//! seeds pitch and duration independently and substitutes a context-free token
//! for unseen windows; [`BackoffPolicy`] seeds from a window seen as a whole
//! and backs off to shorter shared suffixes before giving up on context.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use tracing::{debug, trace};

use crate::keys::{
    context_tokens, key_to_chord, last_token, parse_duration_token, window_key, ContextKey,
    CHORD_DELIMITER,
};
use crate::markov::{Chain, MarkovModel};
use crate::note::{Chord, Onset};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Number of chords to produce, seed chords included.
    pub length: usize,
    /// Resolution of the generated onsets and durations.
    pub ticks_per_unit: u32,
}

/// Output of [`generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub chords: Vec<Chord>,
    /// Steps whose window was missing from a chain.
    pub fallback_steps: usize,
}

/// Per-chord tokens of the starting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedWindow {
    pub notes: Vec<String>,
    pub durations: Vec<String>,
}

/// One sampled step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub notes: String,
    pub duration: String,
    pub fallback: bool,
}

pub trait SamplingPolicy {
    /// Pick the first `order` chords.
    fn seed(&self, model: &MarkovModel, rng: &mut dyn RngCore) -> Result<SeedWindow>;

    /// Pick the chord following `context`.
    fn next(
        &self,
        model: &MarkovModel,
        context: &ContextKey,
        rng: &mut dyn RngCore,
    ) -> Result<Transition>;
}

/// Independent uniform seeds; unseen windows take the last chord token of a
/// uniformly chosen context, for pitch and duration alike.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferencePolicy;

impl SamplingPolicy for ReferencePolicy {
    fn seed(&self, model: &MarkovModel, rng: &mut dyn RngCore) -> Result<SeedWindow> {
        let notes = uniform_key(model.note_chain(), rng)?;
        let durations = uniform_key(model.duration_chain(), rng)?;
        Ok(SeedWindow {
            notes: split_tokens(notes),
            durations: split_tokens(durations),
        })
    }

    fn next(
        &self,
        model: &MarkovModel,
        context: &ContextKey,
        rng: &mut dyn RngCore,
    ) -> Result<Transition> {
        let notes = model.note_chain().get(&context.notes);
        let durations = model.duration_chain().get(&context.durations);

        match (notes, durations) {
            (Some(notes), Some(durations)) => Ok(Transition {
                notes: weighted_choice(notes, &context.notes, rng)?,
                duration: weighted_choice(durations, &context.durations, rng)?,
                fallback: false,
            }),
            _ => Ok(Transition {
                notes: fallback_token(model.note_chain(), rng)?,
                duration: fallback_token(model.duration_chain(), rng)?,
                fallback: true,
            }),
        }
    }
}

/// Joint seeding and suffix back-off.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackoffPolicy;

impl SamplingPolicy for BackoffPolicy {
    fn seed(&self, model: &MarkovModel, rng: &mut dyn RngCore) -> Result<SeedWindow> {
        let pairs = model.paired_contexts();
        if pairs.is_empty() {
            return ReferencePolicy.seed(model, rng);
        }
        let index = rng.gen_range(0..pairs.len());
        let (notes, durations) = pairs.iter().nth(index).ok_or(Error::EmptyModel)?;
        Ok(SeedWindow {
            notes: split_tokens(notes),
            durations: split_tokens(durations),
        })
    }

    fn next(
        &self,
        model: &MarkovModel,
        context: &ContextKey,
        rng: &mut dyn RngCore,
    ) -> Result<Transition> {
        let (notes, notes_fell_back) = backoff_sample(model.note_chain(), &context.notes, rng)?;
        let (duration, durations_fell_back) =
            backoff_sample(model.duration_chain(), &context.durations, rng)?;
        Ok(Transition {
            notes,
            duration,
            fallback: notes_fell_back || durations_fell_back,
        })
    }
}

/// Policy selector for configuration and the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Reference,
    Backoff,
}

impl PolicyKind {
    pub fn policy(&self) -> Box<dyn SamplingPolicy> {
        match self {
            PolicyKind::Reference => Box::new(ReferencePolicy),
            PolicyKind::Backoff => Box::new(BackoffPolicy),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Reference => write!(f, "reference"),
            PolicyKind::Backoff => write!(f, "backoff"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" => Ok(PolicyKind::Reference),
            "backoff" => Ok(PolicyKind::Backoff),
            other => Err(format!(
                "unknown policy '{other}' (expected reference or backoff)"
            )),
        }
    }
}

/// Walk `model` until `options.length` chords exist.
///
/// Seed chords start at time 0 and each chord begins where the previous one's
/// duration ends. When `length` is shorter than the model order only the first
/// `length` seed chords are returned.
pub fn generate<P>(
    model: &MarkovModel,
    options: &GenerateOptions,
    policy: &P,
    rng: &mut dyn RngCore,
) -> Result<Generated>
where
    P: SamplingPolicy + ?Sized,
{
    let ticks_per_unit =
        NonZeroU32::new(options.ticks_per_unit).ok_or(Error::InvalidTicksPerUnit)?;
    if !model.is_normalized() {
        return Err(Error::ModelNotNormalized);
    }
    if model.note_chain().is_empty() || model.duration_chain().is_empty() {
        return Err(Error::EmptyModel);
    }

    let order = model.order();
    let mut chords = Vec::with_capacity(options.length);
    let mut now = Onset::zero(ticks_per_unit);
    let mut fallback_steps = 0;

    if options.length == 0 {
        return Ok(Generated {
            chords,
            fallback_steps,
        });
    }

    let seed = policy.seed(model, rng)?;
    if seed.notes.len() != order || seed.durations.len() != order {
        return Err(Error::MalformedKey {
            key: seed.notes.join(CHORD_DELIMITER.to_string().as_str()),
            reason: format!("seed window must hold {order} chords"),
        });
    }
    for (notes, duration) in seed.notes.iter().zip(&seed.durations).take(options.length) {
        let duration = parse_duration_token(duration)?;
        chords.push(key_to_chord(notes, duration, now)?);
        now = now.advance(duration);
    }

    while chords.len() < options.length {
        let context = window_key(&chords[chords.len() - order..], model.key_mode());
        let step = policy.next(model, &context, rng)?;
        if step.fallback {
            fallback_steps += 1;
            trace!(context = %context.notes, "unseen context, using fallback");
        }

        let duration = parse_duration_token(&step.duration)?;
        chords.push(key_to_chord(&step.notes, duration, now)?);
        now = now.advance(duration);
    }

    debug!(
        chords = chords.len(),
        fallback_steps, "generated chord sequence"
    );
    Ok(Generated {
        chords,
        fallback_steps,
    })
}

fn split_tokens(key: &str) -> Vec<String> {
    context_tokens(key).map(str::to_string).collect()
}

fn uniform_key<'a>(chain: &'a Chain, rng: &mut dyn RngCore) -> Result<&'a str> {
    if chain.is_empty() {
        return Err(Error::EmptyModel);
    }
    let index = rng.gen_range(0..chain.len());
    chain
        .keys()
        .nth(index)
        .map(String::as_str)
        .ok_or(Error::EmptyModel)
}

/// Context-free substitute: the newest chord token of a random context.
fn fallback_token(chain: &Chain, rng: &mut dyn RngCore) -> Result<String> {
    uniform_key(chain, rng).map(|key| last_token(key).to_string())
}

fn weighted_choice(
    distribution: &BTreeMap<String, f64>,
    context: &str,
    rng: &mut dyn RngCore,
) -> Result<String> {
    let invalid = |reason: String| Error::InvalidDistribution {
        context: context.to_string(),
        reason,
    };
    let index = WeightedIndex::new(distribution.values()).map_err(|e| invalid(e.to_string()))?;
    let pick = index.sample(rng);
    distribution
        .keys()
        .nth(pick)
        .cloned()
        .ok_or_else(|| invalid(format!("index {pick} out of range")))
}

/// Sample after the exact context, or after every context sharing its longest
/// matching suffix. Returns the token and whether the exact context was absent.
fn backoff_sample(chain: &Chain, context: &str, rng: &mut dyn RngCore) -> Result<(String, bool)> {
    if let Some(distribution) = chain.get(context) {
        return Ok((weighted_choice(distribution, context, rng)?, false));
    }

    let delimiter = CHORD_DELIMITER.to_string();
    let tokens: Vec<&str> = context_tokens(context).collect();
    for suffix_len in (1..tokens.len()).rev() {
        let suffix = tokens[tokens.len() - suffix_len..].join(delimiter.as_str());
        let tail = format!("{delimiter}{suffix}");

        let mut merged: BTreeMap<String, f64> = BTreeMap::new();
        for (key, distribution) in chain {
            if key.ends_with(&tail) {
                for (next, weight) in distribution {
                    *merged.entry(next.clone()).or_insert(0.0) += weight;
                }
            }
        }
        if !merged.is_empty() {
            return Ok((weighted_choice(&merged, &suffix, rng)?, true));
        }
    }

    Ok((fallback_token(chain, rng)?, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{chord_key, KeyMode};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chords(keys: &[(&str, u64)]) -> Vec<Chord> {
        let mut at = Onset::zero(NonZeroU32::new(480).unwrap());
        keys.iter()
            .map(|&(key, duration)| {
                let chord = key_to_chord(key, duration, at).unwrap();
                at = at.advance(duration);
                chord
            })
            .collect()
    }

    fn trained(order: usize, keys: &[(&str, u64)]) -> MarkovModel {
        let mut model = MarkovModel::new(order, KeyMode::Raw).unwrap();
        model.update(&chords(keys)).unwrap();
        model.normalize().unwrap();
        model
    }

    fn waltz() -> MarkovModel {
        trained(
            2,
            &[
                ("48,64,67", 480),
                ("55", 240),
                ("60,64", 240),
                ("48,64,67", 480),
                ("53", 240),
                ("57,60", 240),
                ("48,64,67", 480),
                ("55", 240),
                ("60,64", 240),
                ("43,62,65", 960),
            ],
        )
    }

    fn options(length: usize) -> GenerateOptions {
        GenerateOptions {
            length,
            ticks_per_unit: 480,
        }
    }

    fn keys_of(generated: &Generated) -> Vec<String> {
        generated
            .chords
            .iter()
            .map(|c| chord_key(c, KeyMode::Raw))
            .collect()
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let model = waltz();
        for policy in [PolicyKind::Reference, PolicyKind::Backoff] {
            let policy = policy.policy();
            let a = generate(&model, &options(64), policy.as_ref(), &mut StdRng::seed_from_u64(11))
                .unwrap();
            let b = generate(&model, &options(64), policy.as_ref(), &mut StdRng::seed_from_u64(11))
                .unwrap();
            assert_eq!(a, b);
            assert_eq!(a.chords.len(), 64);
        }
    }

    #[test]
    fn onsets_accumulate_durations() {
        let model = trained(1, &[("60", 100), ("62", 100), ("60", 100), ("62", 100)]);
        let generated =
            generate(&model, &options(5), &ReferencePolicy, &mut StdRng::seed_from_u64(3)).unwrap();
        let onsets: Vec<u64> = generated.chords.iter().map(|c| c.onset().ticks()).collect();
        assert_eq!(onsets, vec![0, 100, 200, 300, 400]);
        assert_eq!(generated.fallback_steps, 0);
    }

    #[test]
    fn huge_duration_tokens_saturate_onsets() {
        let model = trained(1, &[("60", u64::MAX), ("62", u64::MAX), ("60", u64::MAX)]);
        let generated =
            generate(&model, &options(6), &ReferencePolicy, &mut StdRng::seed_from_u64(9)).unwrap();
        let onsets: Vec<u64> = generated.chords.iter().map(|c| c.onset().ticks()).collect();
        assert_eq!(onsets[0], 0);
        assert!(onsets[1..].iter().all(|&t| t == u64::MAX));
    }

    #[test]
    fn unseen_windows_fall_back_every_step() {
        let model = trained(2, &[("60", 240), ("62", 240), ("64", 240)]);
        assert_eq!(model.note_chain().len(), 1);

        let generated =
            generate(&model, &options(1000), &ReferencePolicy, &mut StdRng::seed_from_u64(5))
                .unwrap();
        assert_eq!(generated.chords.len(), 1000);
        // Seed (2 chords) and one in-context step, then "60:62" never recurs.
        assert_eq!(generated.fallback_steps, 997);
        let keys = keys_of(&generated);
        assert_eq!(&keys[..3], &["60", "62", "64"]);
        assert!(keys[3..].iter().all(|k| k == "62"));
    }

    #[test]
    fn backoff_uses_shared_suffix() {
        // "62:64" is never a context, but "60:64" shares its last chord.
        let model = trained(
            2,
            &[
                ("60", 1),
                ("64", 1),
                ("67", 1),
                ("65", 1),
                ("62", 1),
                ("60", 1),
                ("64", 1),
                ("67", 1),
            ],
        );
        let context = ContextKey {
            notes: "62:64".to_string(),
            durations: "1:1".to_string(),
        };
        let mut rng = StdRng::seed_from_u64(9);
        let step = BackoffPolicy.next(&model, &context, &mut rng).unwrap();
        assert!(step.fallback);
        assert_eq!(step.notes, "67");
        assert_eq!(step.duration, "1");
    }

    #[test]
    fn backoff_seed_is_a_trained_pair() {
        let model = waltz();
        let mut rng = StdRng::seed_from_u64(1);
        let seed = BackoffPolicy.seed(&model, &mut rng).unwrap();
        let pair = (seed.notes.join(":"), seed.durations.join(":"));
        assert!(model.paired_contexts().contains(&pair));
    }

    #[test]
    fn short_lengths_truncate_seed() {
        let model = waltz();
        let mut rng = StdRng::seed_from_u64(2);
        let one = generate(&model, &options(1), &ReferencePolicy, &mut rng).unwrap();
        assert_eq!(one.chords.len(), 1);
        let none = generate(&model, &options(0), &ReferencePolicy, &mut rng).unwrap();
        assert!(none.chords.is_empty());
    }

    #[test]
    fn generation_requires_normalized_model() {
        let mut model = MarkovModel::new(1, KeyMode::Raw).unwrap();
        model.update(&chords(&[("60", 1), ("62", 1)])).unwrap();
        let err = generate(&model, &options(4), &ReferencePolicy, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotNormalized));
    }

    #[test]
    fn policy_kind_parses() {
        assert_eq!("backoff".parse::<PolicyKind>().unwrap(), PolicyKind::Backoff);
        assert_eq!(PolicyKind::default().to_string(), "reference");
        assert!("greedy".parse::<PolicyKind>().is_err());
    }
}
