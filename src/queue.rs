//! # Mood Queue Generation
//!
//! Builds a play queue for one mood by selecting repeatedly: every pick
//! becomes the "current" track for the next round and joins the history, so
//! the recently-played exclusion and the artist diversity penalty apply within
//! the queue as well as against what was heard before it.
//!
//! Each hop after the first carries a transition plan for the playback host.

use crate::config::TransitionConfig;
use crate::selector::{SelectOptions, TrackSelector};
use crate::transition::{plan_transition, TransitionPlan};
use crate::types::{MoodTargetParams, Track, TrackScore};
use anyhow::{Context, Result};
use rand::{thread_rng, Rng};
use serde::Serialize;
use std::collections::HashSet;

/// What to build a queue for.
#[derive(Debug, Clone)]
pub struct QueueRequest<'a> {
    pub target: &'a MoodTargetParams,
    /// Track playing when the queue starts, if any.
    pub current: Option<&'a Track>,
    /// Play history, oldest first.
    pub history: &'a [Track],
    pub length: usize,
    pub include_recommendations: bool,
}

/// One queued track and how to get to it from the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub score: TrackScore,
    /// `None` for the first entry when nothing was playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionPlan>,
}

/// Builds a queue using the thread-local random source.
///
/// # Errors
///
/// See [`generate_queue_with_rng`].
pub fn generate_queue(
    selector: &TrackSelector,
    pool: &[Track],
    request: &QueueRequest<'_>,
    transitions: &TransitionConfig,
) -> Result<Vec<QueueEntry>> {
    generate_queue_with_rng(selector, pool, request, transitions, &mut thread_rng())
}

/// Builds up to `request.length` entries.
///
/// The queue ends early once selection starts repeating a queued track,
/// which happens when the pool has fewer usable tracks than requested.
///
/// # Errors
///
/// Returns an error if the requested length is zero or a transition cannot be
/// planned with the given configuration.
pub fn generate_queue_with_rng<R: Rng + ?Sized>(
    selector: &TrackSelector,
    pool: &[Track],
    request: &QueueRequest<'_>,
    transitions: &TransitionConfig,
    rng: &mut R,
) -> Result<Vec<QueueEntry>> {
    validate_request(request)?;

    let mut history: Vec<Track> = request.history.to_vec();
    let mut current: Option<Track> = request.current.cloned();
    let mut queued: HashSet<String> = HashSet::new();
    let mut queue = Vec::with_capacity(request.length);

    while queue.len() < request.length {
        let options = SelectOptions {
            target: request.target,
            current: current.as_ref(),
            recent_tracks: &history,
            include_recommendations: request.include_recommendations,
            top_n: selector.config().top_n,
        };

        let Some(picked) = selector.select_next_with_rng(pool, &options, rng) else {
            break;
        };
        if !queued.insert(picked.track.id.clone()) {
            log::debug!(
                "Pool exhausted after {} tracks ('{}' came up again)",
                queue.len(),
                picked.track.id
            );
            break;
        }

        let transition = current
            .as_ref()
            .map(|previous| {
                plan_transition(previous, &picked.track, transitions).with_context(|| {
                    format!("Failed to plan transition into '{}'", picked.track.id)
                })
            })
            .transpose()?;

        history.push(picked.track.clone());
        current = Some(picked.track.clone());
        queue.push(QueueEntry {
            score: picked,
            transition,
        });
    }

    log::info!("Generated a queue of {} tracks", queue.len());
    Ok(queue)
}

fn validate_request(request: &QueueRequest<'_>) -> Result<()> {
    if request.length == 0 {
        anyhow::bail!("Queue length must be at least 1");
    }
    Ok(())
}

/// Ids in queue order.
pub fn queue_ids(queue: &[QueueEntry]) -> Vec<&str> {
    queue.iter().map(|entry| entry.score.track.id.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioFeatures, TempoRange, TrackOrigin};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn target() -> MoodTargetParams {
        MoodTargetParams {
            energy: 0.7,
            valence: 0.6,
            danceability: 0.6,
            tempo_range: TempoRange::new(115.0, 130.0),
            acousticness: None,
            instrumentalness: None,
        }
    }

    fn pool(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track {
                id: format!("t{i}"),
                title: format!("Track {i}"),
                artist: format!("Artist {}", i % 3),
                duration_ms: 200_000,
                features: AudioFeatures {
                    energy: 0.6 + 0.02 * i as f64,
                    valence: 0.6,
                    tempo: 120.0 + i as f64,
                    danceability: 0.6,
                    acousticness: 0.2,
                    instrumentalness: 0.0,
                    key: Some((i % 12) as u8),
                    mode: 1,
                },
                play_count: 0,
                origin: TrackOrigin::Library,
            })
            .collect()
    }

    fn request<'a>(target: &'a MoodTargetParams, length: usize) -> QueueRequest<'a> {
        QueueRequest {
            target,
            current: None,
            history: &[],
            length,
            include_recommendations: true,
        }
    }

    #[test]
    fn test_queue_has_requested_length_without_repeats() {
        let target = target();
        let pool = pool(12);
        let queue = generate_queue_with_rng(
            &TrackSelector::default(),
            &pool,
            &request(&target, 8),
            &TransitionConfig::default(),
            &mut StdRng::seed_from_u64(21),
        )
        .unwrap();

        let ids = queue_ids(&queue);
        assert_eq!(ids.len(), 8);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn test_first_entry_has_no_transition_without_current() {
        let target = target();
        let pool = pool(6);
        let queue = generate_queue_with_rng(
            &TrackSelector::default(),
            &pool,
            &request(&target, 3),
            &TransitionConfig::default(),
            &mut StdRng::seed_from_u64(4),
        )
        .unwrap();

        assert!(queue[0].transition.is_none());
        assert!(queue[1..].iter().all(|entry| entry.transition.is_some()));
    }

    #[test]
    fn test_current_track_gets_a_transition_and_is_skipped() {
        let target = target();
        let pool = pool(6);
        let playing = pool[0].clone();
        let history = vec![playing.clone()];
        let req = QueueRequest {
            current: Some(&playing),
            history: &history,
            ..request(&target, 3)
        };

        let queue = generate_queue_with_rng(
            &TrackSelector::default(),
            &pool,
            &req,
            &TransitionConfig::default(),
            &mut StdRng::seed_from_u64(8),
        )
        .unwrap();

        assert!(queue[0].transition.is_some());
        assert!(!queue_ids(&queue).contains(&"t0"));
    }

    #[test]
    fn test_small_pool_ends_queue_early() {
        let target = target();
        let pool = pool(3);
        let queue = generate_queue_with_rng(
            &TrackSelector::default(),
            &pool,
            &request(&target, 10),
            &TransitionConfig::default(),
            &mut StdRng::seed_from_u64(2),
        )
        .unwrap();
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_zero_length_is_rejected() {
        let target = target();
        let result = generate_queue(
            &TrackSelector::default(),
            &pool(3),
            &request(&target, 0),
            &TransitionConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_pool_gives_empty_queue() {
        let target = target();
        let queue = generate_queue(
            &TrackSelector::default(),
            &[],
            &request(&target, 4),
            &TransitionConfig::default(),
        )
        .unwrap();
        assert!(queue.is_empty());
    }
}
