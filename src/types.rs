//! # Shared Value Types
//!
//! Everything the resolver produces and the selector consumes is a plain value:
//! target parameters, parse results, tracks and their scores. None of these are
//! mutated once built; a new value is produced per parse or scoring pass.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Tempo window used when nothing else specified one.
pub const DEFAULT_TEMPO_MIN: f64 = 80.0;
pub const DEFAULT_TEMPO_MAX: f64 = 130.0;

/// Lowest and highest BPM a target window may reach after clamping.
pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 220.0;

/// Inclusive BPM window. `min <= max` always holds for values built with [`TempoRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
}

impl TempoRange {
    /// Builds a window, swapping the bounds when they arrive inverted.
    pub fn new(min: f64, max: f64) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn contains(&self, bpm: f64) -> bool {
        bpm >= self.min && bpm <= self.max
    }

    /// Distance in BPM from `bpm` to the nearer bound; zero inside the window.
    pub fn distance(&self, bpm: f64) -> f64 {
        if bpm < self.min {
            self.min - bpm
        } else if bpm > self.max {
            bpm - self.max
        } else {
            0.0
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_TEMPO_MIN,
            max: DEFAULT_TEMPO_MAX,
        }
    }
}

/// Quantified musical intent: what a track should feel like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodTargetParams {
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
    pub tempo_range: TempoRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acousticness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
}

impl MoodTargetParams {
    /// Forces every field into its valid range and orders the tempo window.
    pub fn clamped(self) -> Self {
        let min = self.tempo_range.min.clamp(MIN_BPM, MAX_BPM);
        let max = self.tempo_range.max.clamp(MIN_BPM, MAX_BPM);
        Self {
            energy: clamp_unit(self.energy),
            valence: clamp_unit(self.valence),
            danceability: clamp_unit(self.danceability),
            tempo_range: TempoRange::new(min, max),
            acousticness: self.acousticness.map(clamp_unit),
            instrumentalness: self.instrumentalness.map(clamp_unit),
        }
    }
}

impl Default for MoodTargetParams {
    /// The neutral mood every tier falls back to when a field has no signal.
    fn default() -> Self {
        Self {
            energy: 0.5,
            valence: 0.5,
            danceability: 0.5,
            tempo_range: TempoRange::default(),
            acousticness: Some(0.3),
            instrumentalness: None,
        }
    }
}

/// NaN collapses to 0 so a bad model answer can never poison scoring.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Which strategy produced a [`ParseResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    Preset,
    Embedding,
    Llm,
    Keyword,
    Default,
    None,
}

impl ParseMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preset => "preset",
            Self::Embedding => "embedding",
            Self::Llm => "llm",
            Self::Keyword => "keyword",
            Self::Default => "default",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful answer from one resolution tier, before timing is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub method: ParseMethod,
    pub params: MoodTargetParams,
    pub confidence: f64,
    pub category: Option<String>,
}

impl Resolution {
    pub fn new(method: ParseMethod, params: MoodTargetParams, confidence: f64) -> Self {
        Self {
            method,
            params,
            confidence: clamp_unit(confidence),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Outcome of resolving one mood description.
///
/// Build it through [`ParseResult::resolved`] or [`ParseResult::none`]; those
/// keep `method == None` and `params == None` in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub params: Option<MoodTargetParams>,
    pub method: ParseMethod,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub processing_time_ms: u64,
}

impl ParseResult {
    pub fn resolved(resolution: Resolution, elapsed: Duration) -> Self {
        debug_assert_ne!(resolution.method, ParseMethod::None);
        Self {
            params: Some(resolution.params),
            method: resolution.method,
            confidence: resolution.confidence,
            category: resolution.category,
            processing_time_ms: elapsed_ms(elapsed),
        }
    }

    pub fn none(elapsed: Duration) -> Self {
        Self {
            params: None,
            method: ParseMethod::None,
            confidence: 0.0,
            category: None,
            processing_time_ms: elapsed_ms(elapsed),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.params.is_some()
    }

    /// Same answer, new latency. Used when serving from the cache.
    pub fn retimed(&self, elapsed: Duration) -> Self {
        Self {
            processing_time_ms: elapsed_ms(elapsed),
            ..self.clone()
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Where a candidate came from when the pool was assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOrigin {
    #[default]
    Library,
    Recommended,
}

/// Numeric descriptors produced by the external audio analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFeatures {
    pub energy: f64,
    pub valence: f64,
    pub tempo: f64,
    pub danceability: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    /// Pitch class 0..=11; `None` when the analyzer could not tell.
    #[serde(default)]
    pub key: Option<u8>,
    /// 1 = major, 0 = minor.
    #[serde(default)]
    pub mode: u8,
}

impl AudioFeatures {
    /// Descriptors that sit exactly on a target: mid-window tempo, neutral key.
    pub fn matching(target: &MoodTargetParams) -> Self {
        Self {
            energy: target.energy,
            valence: target.valence,
            tempo: target.tempo_range.midpoint(),
            danceability: target.danceability,
            acousticness: target.acousticness.unwrap_or(0.3),
            instrumentalness: target.instrumentalness.unwrap_or(0.0),
            key: None,
            mode: 1,
        }
    }
}

/// A playable track as handed over by a provider. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub features: AudioFeatures,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub origin: TrackOrigin,
}

/// Score breakdown for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackScore {
    pub track: Track,
    pub mood_score: f64,
    pub transition_score: f64,
    pub total_score: f64,
}
