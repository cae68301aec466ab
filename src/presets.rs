//! # Preset Catalog
//!
//! Named mood categories with example phrases and the target parameters each
//! one stands for. The catalog ships as a versioned JSON file bundled into the
//! binary; a host may point the configuration at a replacement file, typically
//! one carrying precomputed phrase embeddings.

use crate::capability::Embedder;
use crate::types::MoodTargetParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/presets.json");

lazy_static::lazy_static! {
    static ref BUILTIN: PresetCatalog = PresetCatalog::from_json(BUILTIN_CATALOG)
        .unwrap_or_else(|e| {
            log::error!("Bundled preset catalog is unreadable: {e:#}");
            PresetCatalog::default()
        });
}

/// Canonical form used for every text comparison: trimmed and lowercased.
pub fn normalize_mood_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One named mood and the phrases that describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodPreset {
    pub category: String,
    pub phrases: Vec<String>,
    pub params: MoodTargetParams,
    /// One vector per phrase, same order. Empty when not precomputed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeddings: Vec<Vec<f32>>,
}

impl MoodPreset {
    pub fn has_embeddings(&self) -> bool {
        !self.embeddings.is_empty()
    }

    /// Phrase/vector pairs, stopping at the shorter of the two lists.
    pub fn embedded_phrases(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.phrases
            .iter()
            .zip(self.embeddings.iter())
            .map(|(phrase, vector)| (phrase.as_str(), vector.as_slice()))
    }
}

/// A preset that resembles the input, with how strongly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetMatch<'a> {
    pub preset: &'a MoodPreset,
    pub phrase: &'a str,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetCatalog {
    #[serde(default)]
    pub version: u32,
    pub presets: Vec<MoodPreset>,
}

impl PresetCatalog {
    /// The catalog bundled with the crate.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parses a catalog document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not have the catalog shape.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut catalog: Self =
            serde_json::from_str(json).context("Preset catalog is not valid JSON")?;
        catalog.sanitize();
        Ok(catalog)
    }

    /// Reads a catalog file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preset catalog at {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Failed to parse preset catalog at {}", path.display()))
    }

    pub fn presets(&self) -> &[MoodPreset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.category.as_str())
    }

    pub fn get(&self, category: &str) -> Option<&MoodPreset> {
        let wanted = normalize_mood_text(category);
        self.presets
            .iter()
            .find(|p| normalize_mood_text(&p.category) == wanted)
    }

    /// Category name or phrase equal to the (already normalized) input.
    pub fn exact_match(&self, normalized: &str) -> Option<&MoodPreset> {
        self.presets.iter().find(|preset| {
            normalize_mood_text(&preset.category) == normalized
                || preset
                    .phrases
                    .iter()
                    .any(|phrase| normalize_mood_text(phrase) == normalized)
        })
    }

    /// Best substring/word-overlap match across every category name and phrase.
    ///
    /// Whole-word containment in either direction scores `0.6` plus up to `0.4`
    /// for how much of the longer side it covers; anything else scores the
    /// Jaccard overlap of the two word sets.
    pub fn best_partial_match(&self, normalized: &str) -> Option<PresetMatch<'_>> {
        let input_words: Vec<&str> = normalized.split_whitespace().collect();
        if input_words.is_empty() {
            return None;
        }

        self.presets
            .iter()
            .flat_map(|preset| {
                std::iter::once(preset.category.as_str())
                    .chain(preset.phrases.iter().map(String::as_str))
                    .map(move |phrase| (preset, phrase))
            })
            .filter_map(|(preset, phrase)| {
                let lowered = normalize_mood_text(phrase);
                let phrase_words: Vec<&str> = lowered.split_whitespace().collect();
                let similarity = word_similarity(&input_words, &phrase_words);
                (similarity > 0.0).then_some(PresetMatch {
                    preset,
                    phrase,
                    similarity,
                })
            })
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Whether any preset carries phrase vectors.
    pub fn has_embeddings(&self) -> bool {
        self.presets.iter().any(MoodPreset::has_embeddings)
    }

    /// Dimensionality of the phrase vectors. Loading and warm-up drop any
    /// preset whose vectors disagree, so the first vector speaks for all.
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.presets
            .iter()
            .flat_map(|p| p.embeddings.iter())
            .map(Vec::len)
            .next()
    }

    /// Fills in phrase vectors for presets that ship without them.
    ///
    /// Shipped vectors whose dimensionality differs from the embedder's are
    /// replaced as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedder fails on any phrase.
    pub async fn with_embeddings(mut self, embedder: &dyn Embedder) -> Result<Self> {
        if let Some(dimension) = self.embed_missing(embedder).await? {
            if self.drop_mixed_dimensions(Some(dimension)) > 0 {
                self.embed_missing(embedder).await?;
            }
        }
        Ok(self)
    }

    /// Embeds every phrase of presets without vectors. Returns the
    /// dimensionality the embedder answered with, if it was called.
    async fn embed_missing(&mut self, embedder: &dyn Embedder) -> Result<Option<usize>> {
        let mut computed_dimension = None;
        for preset in self.presets.iter_mut().filter(|p| !p.has_embeddings()) {
            let mut vectors = Vec::with_capacity(preset.phrases.len());
            for phrase in &preset.phrases {
                let vector = embedder.embed(phrase).await.with_context(|| {
                    format!("Failed to embed phrase '{phrase}' of '{}'", preset.category)
                })?;
                vectors.push(vector);
            }
            log::debug!(
                "Embedded {} phrases for preset '{}'",
                vectors.len(),
                preset.category
            );
            computed_dimension = computed_dimension.or_else(|| vectors.first().map(Vec::len));
            preset.embeddings = vectors;
        }
        Ok(computed_dimension)
    }

    /// Clears the vectors of every preset that disagrees with `reference`,
    /// or with the first embedded preset when no reference is given.
    /// Returns how many presets lost their vectors.
    fn drop_mixed_dimensions(&mut self, reference: Option<usize>) -> usize {
        let mut dimension = reference;
        let mut dropped = 0;
        for preset in &mut self.presets {
            let Some(first) = preset.embeddings.first().map(Vec::len) else {
                continue;
            };
            let expected = *dimension.get_or_insert(first);
            if preset.embeddings.iter().any(|v| v.len() != expected) {
                log::warn!(
                    "Preset '{}' has phrase vectors that are not {expected}-dimensional; dropping embeddings",
                    preset.category
                );
                preset.embeddings.clear();
                dropped += 1;
            }
        }
        dropped
    }

    fn sanitize(&mut self) {
        let mut seen = HashSet::new();
        for preset in &mut self.presets {
            if !seen.insert(normalize_mood_text(&preset.category)) {
                log::warn!("Duplicate preset category '{}'", preset.category);
            }
            if preset.has_embeddings() && preset.embeddings.len() != preset.phrases.len() {
                log::warn!(
                    "Preset '{}' has {} phrases but {} embeddings; dropping embeddings",
                    preset.category,
                    preset.phrases.len(),
                    preset.embeddings.len()
                );
                preset.embeddings.clear();
            }
            preset.params = preset.params.clone().clamped();
        }
        self.drop_mixed_dimensions(None);
    }
}

fn word_similarity(input: &[&str], phrase: &[&str]) -> f64 {
    if phrase.is_empty() {
        return 0.0;
    }

    let (shorter, longer) = if input.len() <= phrase.len() {
        (input, phrase)
    } else {
        (phrase, input)
    };

    if longer.windows(shorter.len()).any(|window| window == shorter) {
        #[allow(clippy::cast_precision_loss)]
        let coverage = shorter.len() as f64 / longer.len() as f64;
        return 0.6 + 0.4 * coverage;
    }

    let a: HashSet<&str> = input.iter().copied().collect();
    let b: HashSet<&str> = phrase.iter().copied().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let jaccard = a.intersection(&b).count() as f64 / union as f64;
    jaccard
}
