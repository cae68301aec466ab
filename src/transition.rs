//! Cut points and energy ramps for handing playback from one track to the next.

use crate::algorithm::{bpm_proximity, key_compatibility};
use crate::config::TransitionConfig;
use crate::types::Track;
use anyhow::Result;
use serde::Serialize;

/// Key and tempo agreement above which a long crossfade sounds right.
const SMOOTH_KEY_THRESHOLD: f64 = 0.85;
const SMOOTH_BPM_THRESHOLD: f64 = 0.9;

/// Where to leave the current track and where to enter the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPoint {
    pub transition_point_ms: u64,
    pub seek_point_ms: u64,
}

/// Cut `before_end_ms` before the end of `current`, start `next` from the top.
pub fn simple_transition(current: &Track, _next: &Track, before_end_ms: u64) -> TransitionPoint {
    TransitionPoint {
        transition_point_ms: current.duration_ms.saturating_sub(before_end_ms),
        seek_point_ms: 0,
    }
}

/// Whether the next track should be chosen and buffered now.
pub fn should_prepare_next(progress_ms: u64, duration_ms: u64, lead_ms: u64) -> bool {
    duration_ms.saturating_sub(progress_ms) <= lead_ms
}

/// `steps` energy levels easing from `from` to `to`.
///
/// # Errors
///
/// Returns an error when `steps < 2`; a path needs both endpoints.
pub fn energy_path(from: f64, to: f64, steps: usize) -> Result<Vec<f64>> {
    if steps < 2 {
        anyhow::bail!("An energy path needs at least 2 steps, got {steps}");
    }

    #[allow(clippy::cast_precision_loss)]
    let last = (steps - 1) as f64;
    Ok((0..steps)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / last;
            from + (to - from) * ease_in_out(t)
        })
        .collect())
}

fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Everything a playback host needs to perform one hand-over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPlan {
    #[serde(flatten)]
    pub point: TransitionPoint,
    pub crossfade_ms: u64,
    pub key_compatibility: f64,
    pub bpm_compatibility: f64,
    pub energy_ramp: Vec<f64>,
}

/// Cut point, crossfade length and energy ramp for `current` → `next`.
///
/// Harmonically compatible tracks at matching tempo get the long crossfade;
/// anything else gets the short one so clashing keys or beats are heard
/// only briefly.
///
/// # Errors
///
/// Returns an error if `config.ramp_steps` is below 2.
pub fn plan_transition(current: &Track, next: &Track, config: &TransitionConfig) -> Result<TransitionPlan> {
    let key = key_compatibility(current, next);
    let bpm = bpm_proximity(current.features.tempo, next.features.tempo);
    let crossfade_ms = if key >= SMOOTH_KEY_THRESHOLD && bpm >= SMOOTH_BPM_THRESHOLD {
        config.smooth_crossfade_ms
    } else {
        config.short_crossfade_ms
    };

    let plan = TransitionPlan {
        point: simple_transition(current, next, config.before_end_ms),
        crossfade_ms,
        key_compatibility: key,
        bpm_compatibility: bpm,
        energy_ramp: energy_path(current.features.energy, next.features.energy, config.ramp_steps)?,
    };
    log::debug!(
        "Transition '{}' -> '{}' at {} ms with {} ms crossfade",
        current.id,
        next.id,
        plan.point.transition_point_ms,
        plan.crossfade_ms
    );
    Ok(plan)
}
