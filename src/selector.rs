//! # Track Selection
//!
//! Picks the next track from a candidate pool. Recently played tracks are set
//! aside, the rest are scored against the target mood and the current track,
//! and one of the best few is drawn with probability proportional to its
//! score. Drawing instead of always taking the top hit keeps repeated sessions
//! with the same mood from sounding identical.

use crate::algorithm::ScoringContext;
use crate::config::SelectionConfig;
use crate::types::{MoodTargetParams, Track, TrackOrigin, TrackScore};
use rand::{thread_rng, Rng};
use std::collections::HashSet;

/// How far outside the target a track may sit before [`pre_filter_tracks`] drops it.
const PREFILTER_FEATURE_TOLERANCE: f64 = 0.5;
const PREFILTER_TEMPO_TOLERANCE_BPM: f64 = 20.0;

/// Per-call inputs of a selection.
#[derive(Debug, Clone)]
pub struct SelectOptions<'a> {
    pub target: &'a MoodTargetParams,
    pub current: Option<&'a Track>,
    /// Play history, oldest first.
    pub recent_tracks: &'a [Track],
    pub include_recommendations: bool,
    pub top_n: usize,
}

impl<'a> SelectOptions<'a> {
    /// Options for a first pick with no history.
    #[must_use]
    pub fn new(target: &'a MoodTargetParams) -> Self {
        Self {
            target,
            current: None,
            recent_tracks: &[],
            include_recommendations: true,
            top_n: SelectionConfig::default().top_n,
        }
    }

    pub fn with_current(mut self, current: &'a Track) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_history(mut self, recent_tracks: &'a [Track]) -> Self {
        self.recent_tracks = recent_tracks;
        self
    }

    pub fn with_recommendations(mut self, include: bool) -> Self {
        self.include_recommendations = include;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

/// Scorer plus the history windows it selects with.
#[derive(Debug, Clone, Default)]
pub struct TrackSelector {
    scoring: ScoringContext,
    config: SelectionConfig,
}

impl TrackSelector {
    #[must_use]
    pub fn new(scoring: ScoringContext, config: SelectionConfig) -> Self {
        Self { scoring, config }
    }

    pub fn scoring(&self) -> &ScoringContext {
        &self.scoring
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Picks the next track using the thread-local random source.
    pub fn select_next(&self, pool: &[Track], options: &SelectOptions<'_>) -> Option<TrackScore> {
        self.select_next_with_rng(pool, options, &mut thread_rng())
    }

    /// Picks the next track, drawing from `rng`.
    ///
    /// Returns `None` only for an empty pool.
    pub fn select_next_with_rng<R: Rng + ?Sized>(
        &self,
        pool: &[Track],
        options: &SelectOptions<'_>,
        rng: &mut R,
    ) -> Option<TrackScore> {
        if pool.is_empty() {
            log::debug!("Empty candidate pool, nothing to select");
            return None;
        }

        let recent_ids = recent_ids(options.recent_tracks, self.config.recent_window);
        let recent_artists = recent_artists(options.recent_tracks, self.config.recent_artist_window);

        let mut allowed: Vec<&Track> = pool
            .iter()
            .filter(|t| options.include_recommendations || t.origin != TrackOrigin::Recommended)
            .collect();
        if allowed.is_empty() {
            log::debug!("Pool holds only recommendations, ignoring the opt-out");
            allowed = pool.iter().collect();
        }

        let mut eligible: Vec<&Track> = allowed
            .iter()
            .copied()
            .filter(|t| !recent_ids.contains(t.id.as_str()))
            .collect();
        if eligible.is_empty() {
            // repeat a recent track rather than select nothing
            log::debug!(
                "All {} candidates were played recently, ignoring the history",
                allowed.len()
            );
            eligible = allowed;
        }

        let mut ranked = self
            .scoring
            .rank(eligible, options.target, options.current, &recent_artists);
        ranked.truncate(options.top_n.max(1));

        let index = weighted_index(&ranked, rng);
        let picked = ranked.swap_remove(index);
        log::debug!(
            "Selected '{}' by {} (total {:.3}, mood {:.3}, transition {:.3}) from top {}",
            picked.track.title,
            picked.track.artist,
            picked.total_score,
            picked.mood_score,
            picked.transition_score,
            ranked.len() + 1
        );
        Some(picked)
    }
}

/// [`TrackSelector::select_next`] with default weights and windows.
pub fn select_next(pool: &[Track], options: &SelectOptions<'_>) -> Option<TrackScore> {
    TrackSelector::default().select_next(pool, options)
}

/// [`TrackSelector::select_next_with_rng`] with default weights and windows.
pub fn select_next_with_rng<R: Rng + ?Sized>(
    pool: &[Track],
    options: &SelectOptions<'_>,
    rng: &mut R,
) -> Option<TrackScore> {
    TrackSelector::default().select_next_with_rng(pool, options, rng)
}

/// Index drawn with probability `score / sum`. Falls back to the first entry
/// when the scores do not form a usable distribution.
fn weighted_index<R: Rng + ?Sized>(ranked: &[TrackScore], rng: &mut R) -> usize {
    let sum: f64 = ranked.iter().map(|s| s.total_score.max(0.0)).sum();
    if !sum.is_finite() || sum <= 0.0 {
        return 0;
    }

    let draw = rng.gen::<f64>() * sum;
    let mut cumulative = 0.0;
    for (index, scored) in ranked.iter().enumerate() {
        cumulative += scored.total_score.max(0.0);
        if draw < cumulative {
            return index;
        }
    }
    // rounding left the draw just past the last bucket
    ranked.len().saturating_sub(1)
}

fn recent_ids(history: &[Track], window: usize) -> HashSet<&str> {
    tail(history, window).iter().map(|t| t.id.as_str()).collect()
}

fn recent_artists(history: &[Track], window: usize) -> HashSet<String> {
    tail(history, window)
        .iter()
        .filter(|t| !t.artist.is_empty())
        .map(|t| t.artist.to_lowercase())
        .collect()
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Caps on each source when assembling a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCaps {
    pub library: usize,
    pub recommended: usize,
}

impl From<&SelectionConfig> for PoolCaps {
    fn from(config: &SelectionConfig) -> Self {
        Self {
            library: config.library_cap,
            recommended: config.recommendation_cap,
        }
    }
}

impl Default for PoolCaps {
    fn default() -> Self {
        Self::from(&SelectionConfig::default())
    }
}

/// Merges library tracks and recommendations into one pool.
///
/// Each source contributes at most its cap. A track already present, by id,
/// is skipped, so a recommended track the user already owns stays tagged as
/// a library track.
pub fn build_candidate_pool(library: &[Track], recommended: &[Track], caps: PoolCaps) -> Vec<Track> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pool = Vec::with_capacity(caps.library.min(library.len()) + caps.recommended.min(recommended.len()));

    for (source, cap, origin) in [
        (library, caps.library, TrackOrigin::Library),
        (recommended, caps.recommended, TrackOrigin::Recommended),
    ] {
        let mut taken = 0;
        for track in source {
            if taken == cap {
                break;
            }
            if seen.insert(track.id.as_str()) {
                pool.push(Track {
                    origin,
                    ..track.clone()
                });
                taken += 1;
            }
        }
    }

    log::debug!(
        "Candidate pool: {} tracks from {} library and {} recommended",
        pool.len(),
        library.len(),
        recommended.len()
    );
    pool
}

/// Drops tracks far from the target before the (more expensive) scoring pass.
///
/// Keeps energy and valence within 0.5 of the target and tempo within 20 BPM
/// of the window. Order is preserved.
pub fn pre_filter_tracks<'a>(tracks: &'a [Track], target: &MoodTargetParams) -> Vec<&'a Track> {
    tracks
        .iter()
        .filter(|t| {
            (t.features.energy - target.energy).abs() <= PREFILTER_FEATURE_TOLERANCE
                && (t.features.valence - target.valence).abs() <= PREFILTER_FEATURE_TOLERANCE
                && target.tempo_range.distance(t.features.tempo) <= PREFILTER_TEMPO_TOLERANCE_BPM
        })
        .collect()
}
