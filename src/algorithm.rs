//! Track scoring algorithms for mood-driven selection.
//!
//! A candidate is judged twice: how well it fits the target mood, and how well
//! it follows the track that is currently playing. The two are blended into a
//! total that the selector ranks by.

use crate::camelot::CamelotKey;
use crate::types::{MoodTargetParams, Track, TrackScore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Weights of the additive mood-fit terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodWeights {
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
    pub acousticness: f64,
}

impl Default for MoodWeights {
    fn default() -> Self {
        Self {
            energy: 0.35,
            valence: 0.35,
            danceability: 0.15,
            acousticness: 0.15,
        }
    }
}

/// Weights of the transition sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionWeights {
    pub key: f64,
    pub bpm: f64,
    pub energy_flow: f64,
    pub diversity: f64,
}

impl Default for TransitionWeights {
    fn default() -> Self {
        Self {
            key: 0.35,
            bpm: 0.35,
            energy_flow: 0.20,
            diversity: 0.10,
        }
    }
}

/// Immutable scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringContext {
    pub mood_weight: f64,
    pub transition_weight: f64,
    pub mood: MoodWeights,
    pub transition: TransitionWeights,
    /// BPM outside the target window that costs the whole tempo score.
    pub tempo_falloff_bpm: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            mood_weight: 0.6,
            transition_weight: 0.4,
            mood: MoodWeights::default(),
            transition: TransitionWeights::default(),
            tempo_falloff_bpm: 30.0,
        }
    }
}

impl ScoringContext {
    /// How well `track` fits `target`, in [0, 1].
    ///
    /// ```text
    /// base  = Σ wᵢ · (1 − |trackᵢ − targetᵢ|)     energy, valence, danceability, acousticness
    /// mood  = base · (0.5 + 0.5 · tempo_score)
    /// ```
    ///
    /// When the target has no acousticness opinion the remaining weights are
    /// renormalized, so a perfect fit still scores 1. Tempo can halve the
    /// score but never zero it.
    #[must_use]
    pub fn mood_score(&self, track: &Track, target: &MoodTargetParams) -> f64 {
        let f = &track.features;
        let w = &self.mood;

        let mut terms = vec![
            (w.energy, similarity(f.energy, target.energy)),
            (w.valence, similarity(f.valence, target.valence)),
            (w.danceability, similarity(f.danceability, target.danceability)),
        ];
        if let Some(acousticness) = target.acousticness {
            terms.push((w.acousticness, similarity(f.acousticness, acousticness)));
        }

        let weight_sum: f64 = terms.iter().map(|(weight, _)| weight).sum();
        if weight_sum <= 0.0 {
            return 0.0;
        }
        let base = terms.iter().map(|(weight, sim)| weight * sim).sum::<f64>() / weight_sum;

        let tempo = self.tempo_score(f.tempo, target);
        let score = base * (0.5 + 0.5 * tempo);
        log::trace!("Mood score for '{}': base {base:.3}, tempo {tempo:.3}", track.id);
        score.clamp(0.0, 1.0)
    }

    /// 1 inside the window, losing one unit per `tempo_falloff_bpm` outside it.
    pub fn tempo_score(&self, bpm: f64, target: &MoodTargetParams) -> f64 {
        let distance = target.tempo_range.distance(bpm);
        if distance == 0.0 {
            return 1.0;
        }
        (1.0 - distance / self.tempo_falloff_bpm).max(0.0)
    }

    /// How well `next` follows `current`, in [0, 1].
    ///
    /// `recent_artists` is compared case-insensitively.
    #[must_use]
    pub fn transition_score(
        &self,
        current: &Track,
        next: &Track,
        recent_artists: &HashSet<String>,
    ) -> f64 {
        let w = &self.transition;
        let key = key_compatibility(current, next);
        let bpm = bpm_proximity(current.features.tempo, next.features.tempo);
        let energy = energy_flow(current.features.energy, next.features.energy);
        let diversity = diversity(next, recent_artists);

        log::trace!(
            "Transition '{}' -> '{}': key {key:.2}, bpm {bpm:.2}, energy {energy:.2}, diversity {diversity:.0}",
            current.id,
            next.id
        );

        (w.key * key + w.bpm * bpm + w.energy_flow * energy + w.diversity * diversity)
            .clamp(0.0, 1.0)
    }

    /// Full breakdown for one candidate. No current track means no transition penalty.
    #[must_use]
    pub fn score(
        &self,
        track: &Track,
        target: &MoodTargetParams,
        current: Option<&Track>,
        recent_artists: &HashSet<String>,
    ) -> TrackScore {
        let mood_score = self.mood_score(track, target);
        let transition_score =
            current.map_or(1.0, |current| self.transition_score(current, track, recent_artists));

        TrackScore {
            track: track.clone(),
            mood_score,
            transition_score,
            total_score: self.mood_weight * mood_score + self.transition_weight * transition_score,
        }
    }

    /// Scores every track and sorts best first. Ties keep pool order.
    pub fn rank<'a, I>(
        &self,
        tracks: I,
        target: &MoodTargetParams,
        current: Option<&Track>,
        recent_artists: &HashSet<String>,
    ) -> Vec<TrackScore>
    where
        I: IntoIterator<Item = &'a Track>,
    {
        let mut ranked: Vec<TrackScore> = tracks
            .into_iter()
            .map(|track| self.score(track, target, current, recent_artists))
            .collect();
        ranked.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

fn similarity(value: f64, target: f64) -> f64 {
    (1.0 - (value - target).abs()).clamp(0.0, 1.0)
}

/// Harmonic compatibility from the Camelot wheel; 0.5 when either key is unknown.
pub fn key_compatibility(current: &Track, next: &Track) -> f64 {
    let label = |t: &Track| {
        t.features
            .key
            .and_then(|key| CamelotKey::from_key_mode(key, t.features.mode))
    };

    match (label(current), label(next)) {
        (Some(a), Some(b)) if a == b => 1.0,
        (Some(a), Some(b)) if a.is_compatible_with(&b) => 0.85,
        (Some(a), Some(b)) => (1.0 - 0.15 * f64::from(a.wheel_distance(&b))).max(0.0),
        _ => 0.5,
    }
}

/// Tempo closeness, accepting half-time and double-time as near matches.
pub fn bpm_proximity(current_bpm: f64, next_bpm: f64) -> f64 {
    let diff = [next_bpm, next_bpm * 2.0, next_bpm / 2.0]
        .into_iter()
        .map(|candidate| (current_bpm - candidate).abs())
        .fold(f64::INFINITY, f64::min);

    match diff {
        d if d <= 3.0 => 1.0,
        d if d <= 10.0 => 0.9,
        d if d <= 20.0 => 0.7,
        d => (1.0 - d / 50.0).max(0.0),
    }
}

/// Rewards a gentle build, tolerates steady state and mild drops.
pub fn energy_flow(current_energy: f64, next_energy: f64) -> f64 {
    let d = next_energy - current_energy;
    if (0.05..=0.25).contains(&d) {
        1.0
    } else if d.abs() <= 0.10 {
        0.9
    } else if (-0.20..0.0).contains(&d) {
        0.7
    } else {
        (1.0 - d.abs()).max(0.0)
    }
}

/// 0 for an artist heard recently, 1 otherwise.
pub fn diversity(next: &Track, recent_artists: &HashSet<String>) -> f64 {
    let artist = next.artist.to_lowercase();
    if recent_artists.iter().any(|recent| recent.to_lowercase() == artist) {
        0.0
    } else {
        1.0
    }
}

// =============================================================================
// DEFAULT-WEIGHT ENTRY POINTS
// =============================================================================

/// [`ScoringContext::mood_score`] with default weights.
#[must_use]
pub fn mood_score(track: &Track, target: &MoodTargetParams) -> f64 {
    ScoringContext::default().mood_score(track, target)
}

/// [`ScoringContext::transition_score`] with default weights.
#[must_use]
pub fn transition_score(current: &Track, next: &Track, recent_artists: &HashSet<String>) -> f64 {
    ScoringContext::default().transition_score(current, next, recent_artists)
}

/// Weighted blend of mood and transition scores with explicit blend weights.
#[must_use]
pub fn total_score(
    track: &Track,
    target: &MoodTargetParams,
    current: Option<&Track>,
    recent_artists: &HashSet<String>,
    mood_weight: f64,
    transition_weight: f64,
) -> f64 {
    let context = ScoringContext {
        mood_weight,
        transition_weight,
        ..ScoringContext::default()
    };
    context.score(track, target, current, recent_artists).total_score
}

/// Summary statistics over a scored pool, for diagnostics.
pub mod statistics {
    use crate::types::TrackScore;

    #[derive(Debug, Clone, PartialEq)]
    pub struct ScoreStatistics {
        pub mean: f64,
        pub std_deviation: f64,
        pub min: f64,
        pub max: f64,
        pub count: usize,
    }

    /// `None` for an empty pool.
    pub fn summarize(scores: &[TrackScore]) -> Option<ScoreStatistics> {
        if scores.is_empty() {
            return None;
        }

        let totals: Vec<f64> = scores.iter().map(|s| s.total_score).collect();
        #[allow(clippy::cast_precision_loss)]
        let n = totals.len() as f64;
        let mean = totals.iter().sum::<f64>() / n;
        let variance = totals.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;

        Some(ScoreStatistics {
            mean,
            std_deviation: variance.sqrt(),
            min: totals.iter().copied().fold(f64::INFINITY, f64::min),
            max: totals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            count: totals.len(),
        })
    }
}
