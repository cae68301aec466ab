//! # Resolution Tiers
//!
//! Each strategy for turning mood text into target parameters is a
//! [`ResolutionTier`]. The resolver walks an ordered list of them and stops at
//! the first one that resolves.
//!
//! A tier that cannot run (capability unreachable, no preset vectors) or that
//! gets an unusable answer reports [`TierOutcome::Miss`]. `Err` is reserved for
//! conditions the tier cannot reason about, such as an embedder answering with
//! vectors of the wrong dimensionality.

use crate::cache::{BoundedCache, EvictionPolicy};
use crate::capability::{cosine_similarity, Embedder, GenerateOptions, LocalModel};
use crate::extraction::{build_prompt, parse_model_params};
use crate::keywords::KeywordMatcher;
use crate::presets::{PresetCatalog, PresetMatch};
use crate::types::{ParseMethod, Resolution};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const LLM_CONFIDENCE: f64 = 0.8;
pub const KEYWORD_CONFIDENCE: f64 = 0.5;
/// Keyword result served after another tier failed unexpectedly.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
/// Keyword pass that matched nothing and produced the neutral mood.
pub const DEFAULT_CONFIDENCE: f64 = 0.2;

/// One input as the tiers see it.
#[derive(Debug, Clone, Copy)]
pub struct MoodQuery<'a> {
    /// Exactly what the user typed; handed to the local model verbatim.
    pub raw: &'a str,
    /// Trimmed and lowercased; used for every comparison and cache key.
    pub normalized: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Resolved(Resolution),
    Miss,
}

impl From<Option<Resolution>> for TierOutcome {
    fn from(resolution: Option<Resolution>) -> Self {
        resolution.map_or(Self::Miss, Self::Resolved)
    }
}

#[async_trait]
pub trait ResolutionTier: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn attempt(&self, query: &MoodQuery<'_>) -> Result<TierOutcome>;
}

// =============================================================================
// PRESET MATCHING
// =============================================================================

/// Category name or phrase equal to the input.
pub struct ExactMatchTier {
    catalog: Arc<PresetCatalog>,
}

impl ExactMatchTier {
    pub fn new(catalog: Arc<PresetCatalog>) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, query: &MoodQuery<'_>) -> Option<Resolution> {
        self.catalog.exact_match(query.normalized).map(|preset| {
            Resolution::new(ParseMethod::Preset, preset.params.clone(), EXACT_CONFIDENCE)
                .with_category(&preset.category)
        })
    }
}

#[async_trait]
impl ResolutionTier for ExactMatchTier {
    fn name(&self) -> &'static str {
        "exact"
    }

    async fn attempt(&self, query: &MoodQuery<'_>) -> Result<TierOutcome> {
        Ok(self.resolve(query).into())
    }
}

/// Substring and word-overlap matching, accepted above a similarity floor.
/// Only the quick chain uses it; the full chain has the embedding tier for
/// near matches.
pub struct PartialMatchTier {
    catalog: Arc<PresetCatalog>,
    threshold: f64,
}

impl PartialMatchTier {
    pub fn new(catalog: Arc<PresetCatalog>, threshold: f64) -> Self {
        Self { catalog, threshold }
    }

    pub fn resolve(&self, query: &MoodQuery<'_>) -> Option<Resolution> {
        let PresetMatch {
            preset,
            phrase,
            similarity,
        } = self.catalog.best_partial_match(query.normalized)?;

        if similarity < self.threshold {
            debug!(
                "Closest preset phrase '{phrase}' ({}) at {similarity:.2} is below {:.2}",
                preset.category, self.threshold
            );
            return None;
        }

        debug!("Partial preset match '{phrase}' ({}) at {similarity:.2}", preset.category);
        Some(
            Resolution::new(ParseMethod::Preset, preset.params.clone(), similarity)
                .with_category(&preset.category),
        )
    }
}

#[async_trait]
impl ResolutionTier for PartialMatchTier {
    fn name(&self) -> &'static str {
        "partial"
    }

    async fn attempt(&self, query: &MoodQuery<'_>) -> Result<TierOutcome> {
        Ok(self.resolve(query).into())
    }
}

// =============================================================================
// SEMANTIC EMBEDDING MATCHING
// =============================================================================

/// Nearest preset phrase by cosine similarity of embeddings.
pub struct EmbeddingTier {
    catalog: Arc<PresetCatalog>,
    embedder: Arc<dyn Embedder>,
    threshold: f64,
    cache: Mutex<BoundedCache<String, Vec<f32>>>,
}

impl EmbeddingTier {
    pub fn new(
        catalog: Arc<PresetCatalog>,
        embedder: Arc<dyn Embedder>,
        threshold: f64,
        cache_capacity: usize,
        eviction: EvictionPolicy,
    ) -> Self {
        Self {
            catalog,
            embedder,
            threshold,
            cache: Mutex::new(BoundedCache::new(cache_capacity, eviction)),
        }
    }

    /// Number of input vectors currently remembered.
    pub fn cached_vectors(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Embeds `text`, consulting the cache first. `None` when the embedder fails.
    async fn input_vector(&self, text: &str) -> Option<Vec<f32>> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text);
        if let Some(vector) = cached {
            return Some(vector);
        }

        match self.embedder.embed(text).await {
            Ok(vector) => {
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(text.to_string(), vector.clone());
                Some(vector)
            }
            Err(e) => {
                warn!("Embedding request failed, skipping semantic match: {e:#}");
                None
            }
        }
    }
}

#[async_trait]
impl ResolutionTier for EmbeddingTier {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn attempt(&self, query: &MoodQuery<'_>) -> Result<TierOutcome> {
        let Some(dimension) = self.catalog.embedding_dimension() else {
            debug!("No preset phrase vectors, skipping semantic match");
            return Ok(TierOutcome::Miss);
        };

        if !self.embedder.is_available().await {
            debug!("Embedder unavailable, skipping semantic match");
            return Ok(TierOutcome::Miss);
        }

        let Some(input) = self.input_vector(query.normalized).await else {
            return Ok(TierOutcome::Miss);
        };

        if input.len() != dimension {
            anyhow::bail!(
                "Embedder returned a {}-dimensional vector but preset vectors have {dimension}",
                input.len()
            );
        }

        let input = input.as_slice();
        let best = self
            .catalog
            .presets()
            .iter()
            .flat_map(|preset| {
                preset
                    .embedded_phrases()
                    .map(move |(phrase, vector)| (preset, phrase, cosine_similarity(input, vector)))
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        let Some((preset, phrase, similarity)) = best else {
            return Ok(TierOutcome::Miss);
        };
        let similarity = f64::from(similarity);

        if similarity < self.threshold {
            debug!(
                "Nearest phrase '{phrase}' ({}) at {similarity:.3} is below {:.2}",
                preset.category, self.threshold
            );
            return Ok(TierOutcome::Miss);
        }

        debug!("Semantic match '{phrase}' ({}) at {similarity:.3}", preset.category);
        Ok(TierOutcome::Resolved(
            Resolution::new(ParseMethod::Embedding, preset.params.clone(), similarity)
                .with_category(&preset.category),
        ))
    }
}

// =============================================================================
// LOCAL MODEL EXTRACTION
// =============================================================================

/// Asks the local model for parameters and parses whatever comes back.
pub struct LocalModelTier {
    model: Arc<dyn LocalModel>,
    options: GenerateOptions,
}

impl LocalModelTier {
    pub fn new(model: Arc<dyn LocalModel>, options: GenerateOptions) -> Self {
        Self { model, options }
    }
}

#[async_trait]
impl ResolutionTier for LocalModelTier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn attempt(&self, query: &MoodQuery<'_>) -> Result<TierOutcome> {
        if !self.model.is_available().await {
            debug!("Local model unavailable, skipping extraction");
            return Ok(TierOutcome::Miss);
        }

        let answer = match self.model.generate(&build_prompt(query.raw), &self.options).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Local model request failed: {e:#}");
                return Ok(TierOutcome::Miss);
            }
        };

        match parse_model_params(&answer) {
            Some(params) => Ok(TierOutcome::Resolved(Resolution::new(
                ParseMethod::Llm,
                params,
                LLM_CONFIDENCE,
            ))),
            None => {
                debug!("Local model answer had no usable parameters");
                Ok(TierOutcome::Miss)
            }
        }
    }
}

// =============================================================================
// KEYWORD HEURISTIC
// =============================================================================

/// Lexicon averaging. Always resolves, so it closes the full chain.
pub struct KeywordTier {
    matcher: KeywordMatcher,
}

impl KeywordTier {
    pub fn new(matcher: KeywordMatcher) -> Self {
        Self { matcher }
    }

    /// Keyword result, or the neutral mood at low confidence when nothing matched.
    pub fn resolve(&self, query: &MoodQuery<'_>) -> Resolution {
        let analysis = self.matcher.analyze(query.normalized);
        if analysis.has_signal() {
            Resolution::new(ParseMethod::Keyword, analysis.params, KEYWORD_CONFIDENCE)
        } else {
            Resolution::new(ParseMethod::Default, analysis.params, DEFAULT_CONFIDENCE)
        }
    }

    /// Keyword result only when some word matched the lexicon.
    pub fn resolve_with_signal(&self, query: &MoodQuery<'_>) -> Option<Resolution> {
        let analysis = self.matcher.analyze(query.normalized);
        analysis
            .has_signal()
            .then(|| Resolution::new(ParseMethod::Keyword, analysis.params, KEYWORD_CONFIDENCE))
    }

    /// Keyword result served in place of a tier that failed.
    pub fn fallback(&self, query: &MoodQuery<'_>) -> Resolution {
        let analysis = self.matcher.analyze(query.normalized);
        Resolution::new(ParseMethod::Keyword, analysis.params, FALLBACK_CONFIDENCE)
    }
}

#[async_trait]
impl ResolutionTier for KeywordTier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn attempt(&self, query: &MoodQuery<'_>) -> Result<TierOutcome> {
        Ok(TierOutcome::Resolved(self.resolve(query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn query(text: &str) -> MoodQuery<'_> {
        MoodQuery {
            raw: text,
            normalized: text,
        }
    }

    struct FixedEmbedder {
        available: bool,
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    struct CannedModel(&'static str);

    #[async_trait]
    impl LocalModel for CannedModel {
        async fn is_available(&self) -> bool {
            true
        }

        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Builtin catalog where `happy` phrases point along x and everything else along y.
    fn embedded_catalog() -> Arc<PresetCatalog> {
        let mut catalog = PresetCatalog::builtin();
        for preset in &mut catalog.presets {
            let vector = if preset.category == "happy" {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            };
            preset.embeddings = vec![vector; preset.phrases.len()];
        }
        Arc::new(catalog)
    }

    fn embedding_tier(vector: Vec<f32>, available: bool) -> (EmbeddingTier, Arc<FixedEmbedder>) {
        let embedder = Arc::new(FixedEmbedder {
            available,
            vector,
            calls: AtomicUsize::new(0),
        });
        let tier = EmbeddingTier::new(embedded_catalog(), embedder.clone(), 0.75, 10, EvictionPolicy::Lru);
        (tier, embedder)
    }

    #[test]
    fn test_exact_tier_reports_category() {
        let tier = ExactMatchTier::new(Arc::new(PresetCatalog::builtin()));
        let resolution = tier.resolve(&query("happy")).unwrap();
        assert_eq!(resolution.method, ParseMethod::Preset);
        assert_eq!(resolution.confidence, EXACT_CONFIDENCE);
        assert_eq!(resolution.category.as_deref(), Some("happy"));
        assert!(tier.resolve(&query("happy-ish thoughts")).is_none());
    }

    #[test]
    fn test_partial_tier_threshold() {
        let catalog = Arc::new(PresetCatalog::builtin());
        let lenient = PartialMatchTier::new(catalog.clone(), 0.6);
        let strict = PartialMatchTier::new(catalog, 0.99);

        let q = query("some chill vibes please");
        let hit = lenient.resolve(&q).unwrap();
        assert_eq!(hit.category.as_deref(), Some("chill"));
        assert!(hit.confidence >= 0.6 && hit.confidence < 1.0);
        assert!(strict.resolve(&q).is_none());
    }

    #[tokio::test]
    async fn test_embedding_tier_accepts_close_vector() {
        let (tier, _) = embedding_tier(vec![0.95, 0.1], true);
        let outcome = tier.attempt(&query("walking on sunshine")).await.unwrap();
        let TierOutcome::Resolved(resolution) = outcome else {
            panic!("expected a semantic match");
        };
        assert_eq!(resolution.method, ParseMethod::Embedding);
        assert_eq!(resolution.category.as_deref(), Some("happy"));
        assert!(resolution.confidence >= 0.75 && resolution.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_embedding_tier_rejects_below_threshold() {
        let (tier, _) = embedding_tier(vec![0.7, 0.7], true);
        let outcome = tier.attempt(&query("somewhere between")).await.unwrap();
        assert_eq!(outcome, TierOutcome::Miss);
    }

    #[tokio::test]
    async fn test_embedding_tier_skips_when_unavailable() {
        let (tier, embedder) = embedding_tier(vec![1.0, 0.0], false);
        let outcome = tier.attempt(&query("anything")).await.unwrap();
        assert_eq!(outcome, TierOutcome::Miss);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_tier_skips_catalog_without_vectors() {
        let embedder = Arc::new(FixedEmbedder {
            available: true,
            vector: vec![1.0, 0.0],
            calls: AtomicUsize::new(0),
        });
        let tier = EmbeddingTier::new(
            Arc::new(PresetCatalog::builtin()),
            embedder.clone(),
            0.75,
            10,
            EvictionPolicy::Lru,
        );
        assert_eq!(tier.attempt(&query("anything")).await.unwrap(), TierOutcome::Miss);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_tier_caches_input_vectors() {
        let (tier, embedder) = embedding_tier(vec![1.0, 0.0], true);
        tier.attempt(&query("sunny")).await.unwrap();
        tier.attempt(&query("sunny")).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tier.cached_vectors(), 1);
    }

    #[tokio::test]
    async fn test_embedding_dimension_mismatch_is_an_error() {
        let (tier, _) = embedding_tier(vec![1.0, 0.0, 0.0], true);
        assert!(tier.attempt(&query("sunny")).await.is_err());
    }

    #[tokio::test]
    async fn test_local_model_tier_parses_answer() {
        let model = Arc::new(CannedModel(
            r#"```json
{"energy":0.9,"valence":0.8,"danceability":0.9,"tempo":{"min":125,"max":135}}
```"#,
        ));
        let tier = LocalModelTier::new(model, GenerateOptions::default());
        let TierOutcome::Resolved(resolution) = tier.attempt(&query("rave")).await.unwrap() else {
            panic!("expected extraction");
        };
        assert_eq!(resolution.method, ParseMethod::Llm);
        assert_eq!(resolution.confidence, LLM_CONFIDENCE);
        assert_eq!(resolution.params.energy, 0.9);
    }

    #[tokio::test]
    async fn test_local_model_garbage_is_a_miss() {
        let tier = LocalModelTier::new(Arc::new(CannedModel("no idea")), GenerateOptions::default());
        assert_eq!(tier.attempt(&query("rave")).await.unwrap(), TierOutcome::Miss);
    }

    #[test]
    fn test_keyword_tier_confidences() {
        let tier = KeywordTier::new(KeywordMatcher::default());

        let hit = tier.resolve(&query("feeling happy"));
        assert_eq!(hit.method, ParseMethod::Keyword);
        assert_eq!(hit.confidence, KEYWORD_CONFIDENCE);

        let nothing = tier.resolve(&query("zzz qqq"));
        assert_eq!(nothing.method, ParseMethod::Default);
        assert_eq!(nothing.confidence, DEFAULT_CONFIDENCE);
        assert!(tier.resolve_with_signal(&query("zzz qqq")).is_none());

        let forced = tier.fallback(&query("feeling happy"));
        assert_eq!(forced.method, ParseMethod::Keyword);
        assert_eq!(forced.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(forced.params, hit.params);
    }
}
