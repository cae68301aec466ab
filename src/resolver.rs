//! # Mood Resolution Pipeline
//!
//! [`MoodResolver`] turns free text into [`ParseResult`]s by walking its tiers
//! in order: exact preset match, semantic embedding match, local model
//! extraction, keyword heuristic. Cheap and certain strategies go first, so a
//! preset name never pays for a model round trip.
//!
//! Successful full-chain results are memoized by normalized text. The quick
//! chain (`resolve_quick`) is synchronous: it reads that cache but only runs
//! the in-process tiers and never stores anything.

use crate::cache::BoundedCache;
use crate::capability::{Embedder, GenerateOptions, LocalModel};
use crate::config::{EngineConfig, ResolverConfig};
use crate::extraction::SYSTEM_PROMPT;
use crate::keywords::KeywordMatcher;
use crate::ollama::OllamaClient;
use crate::presets::{normalize_mood_text, PresetCatalog};
use crate::tiers::{
    EmbeddingTier, ExactMatchTier, KeywordTier, LocalModelTier, MoodQuery, PartialMatchTier,
    ResolutionTier, TierOutcome,
};
use crate::types::ParseResult;
use anyhow::Result;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

pub struct MoodResolver {
    catalog: Arc<PresetCatalog>,
    exact: Arc<ExactMatchTier>,
    partial: PartialMatchTier,
    keyword: Arc<KeywordTier>,
    /// Full chain in attempt order. Always ends with the keyword tier.
    tiers: Vec<Arc<dyn ResolutionTier>>,
    cache: Mutex<BoundedCache<String, ParseResult>>,
}

impl MoodResolver {
    pub fn builder(catalog: PresetCatalog) -> MoodResolverBuilder {
        MoodResolverBuilder::new(catalog)
    }

    /// Resolver with no capabilities: exact, partial and keyword matching only.
    #[must_use]
    pub fn offline(catalog: PresetCatalog) -> Self {
        Self::builder(catalog).build()
    }

    /// Resolver wired to the configured Ollama server.
    ///
    /// When the catalog ships without phrase vectors and the embedding model
    /// answers, vectors are computed up front so the semantic tier can run.
    /// Failing that the tier simply stays dormant.
    ///
    /// The computed vectors are not saved, so every call embeds every bundled
    /// phrase again (one request per phrase). Hosts that build resolvers often
    /// should point `preset_catalog` at a catalog file carrying precomputed
    /// vectors, such as the serialized output of
    /// [`PresetCatalog::with_embeddings`].
    ///
    /// # Errors
    ///
    /// Returns an error if a configured preset catalog file cannot be loaded.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut catalog = config.catalog()?;
        let resolver_config = config.resolver.clone();

        if !config.ollama.enabled {
            info!("Local model disabled, resolving with presets and keywords only");
            return Ok(Self::builder(catalog).config(resolver_config).build());
        }

        let client = Arc::new(OllamaClient::new(&config.ollama));

        if !catalog.has_embeddings() && Embedder::is_available(client.as_ref()).await {
            info!(
                "Computing preset phrase vectors with '{}'",
                client.embedding_model()
            );
            match catalog.clone().with_embeddings(client.as_ref()).await {
                Ok(embedded) => catalog = embedded,
                Err(e) => warn!("Preset embedding warm-up failed: {e:#}"),
            }
        }

        let options = GenerateOptions {
            system: Some(SYSTEM_PROMPT.to_string()),
            temperature: config.ollama.temperature,
            max_tokens: Some(config.ollama.max_tokens),
        };

        Ok(Self::builder(catalog)
            .config(resolver_config)
            .embedder(client.clone())
            .local_model(client)
            .generate_options(options)
            .build())
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    /// Names of the full-chain tiers in attempt order.
    pub fn tiers(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    pub fn cached_results(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Full chain. Never fails: an unexpected tier error degrades to a
    /// low-confidence keyword result that is not cached.
    pub async fn resolve(&self, text: &str) -> ParseResult {
        let start = Instant::now();
        let normalized = normalize_mood_text(text);
        let query = MoodQuery {
            raw: text,
            normalized: &normalized,
        };

        if let Some(hit) = self.cached(&normalized) {
            debug!("Cache hit for '{normalized}'");
            return hit.retimed(start.elapsed());
        }

        if normalized.is_empty() {
            debug!("Empty mood text, using the neutral mood");
            return ParseResult::resolved(self.keyword.resolve(&query), start.elapsed());
        }

        for tier in &self.tiers {
            match tier.attempt(&query).await {
                Ok(TierOutcome::Resolved(resolution)) => {
                    let result = ParseResult::resolved(resolution, start.elapsed());
                    info!(
                        "Resolved '{}' via {} (confidence {:.2}) in {} ms",
                        normalized, result.method, result.confidence, result.processing_time_ms
                    );
                    self.lock_cache().insert(normalized.clone(), result.clone());
                    return result;
                }
                Ok(TierOutcome::Miss) => debug!("Tier '{}' missed '{normalized}'", tier.name()),
                Err(e) => {
                    warn!(
                        "Tier '{}' failed on '{normalized}', falling back to keywords: {e:#}",
                        tier.name()
                    );
                    return ParseResult::resolved(self.keyword.fallback(&query), start.elapsed());
                }
            }
        }

        // Only reachable if the chain lost its keyword tier.
        ParseResult::none(start.elapsed())
    }

    /// Synchronous chain: cache, exact, partial, keyword. Returns a `None`
    /// result when nothing in the text is recognizable.
    pub fn resolve_quick(&self, text: &str) -> ParseResult {
        let start = Instant::now();
        let normalized = normalize_mood_text(text);

        if let Some(hit) = self.cached(&normalized) {
            return hit.retimed(start.elapsed());
        }

        let query = MoodQuery {
            raw: text,
            normalized: &normalized,
        };
        let resolution = self
            .exact
            .resolve(&query)
            .or_else(|| self.partial.resolve(&query))
            .or_else(|| self.keyword.resolve_with_signal(&query));

        match resolution {
            Some(resolution) => ParseResult::resolved(resolution, start.elapsed()),
            None => {
                debug!("Quick resolution found nothing in '{normalized}'");
                ParseResult::none(start.elapsed())
            }
        }
    }

    fn cached(&self, normalized: &str) -> Option<ParseResult> {
        self.lock_cache().get(normalized)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, BoundedCache<String, ParseResult>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Assembles a [`MoodResolver`]. Capabilities left unset drop their tier from
/// the chain.
pub struct MoodResolverBuilder {
    catalog: PresetCatalog,
    config: ResolverConfig,
    embedder: Option<Arc<dyn Embedder>>,
    local_model: Option<Arc<dyn LocalModel>>,
    generate_options: GenerateOptions,
}

impl MoodResolverBuilder {
    pub fn new(catalog: PresetCatalog) -> Self {
        Self {
            catalog,
            config: ResolverConfig::default(),
            embedder: None,
            local_model: None,
            generate_options: GenerateOptions {
                system: Some(SYSTEM_PROMPT.to_string()),
                ..GenerateOptions::default()
            },
        }
    }

    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn local_model(mut self, model: Arc<dyn LocalModel>) -> Self {
        self.local_model = Some(model);
        self
    }

    pub fn generate_options(mut self, options: GenerateOptions) -> Self {
        self.generate_options = options;
        self
    }

    pub fn build(self) -> MoodResolver {
        let catalog = Arc::new(self.catalog);
        let config = self.config;

        let exact = Arc::new(ExactMatchTier::new(catalog.clone()));
        let keyword = Arc::new(KeywordTier::new(KeywordMatcher::new(config.min_partial_word_len)));

        let mut tiers: Vec<Arc<dyn ResolutionTier>> = vec![exact.clone()];
        if let Some(embedder) = self.embedder {
            tiers.push(Arc::new(EmbeddingTier::new(
                catalog.clone(),
                embedder,
                config.embedding_threshold,
                config.embedding_cache_capacity,
                config.eviction,
            )));
        }
        if let Some(model) = self.local_model {
            tiers.push(Arc::new(LocalModelTier::new(model, self.generate_options)));
        }
        tiers.push(keyword.clone());

        MoodResolver {
            partial: PartialMatchTier::new(catalog.clone(), config.partial_match_threshold),
            cache: Mutex::new(BoundedCache::new(config.cache_capacity, config.eviction)),
            catalog,
            exact,
            keyword,
            tiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParseMethod;

    #[tokio::test]
    async fn test_offline_chain_shape() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        assert_eq!(resolver.tiers(), vec!["exact", "keyword"]);
    }

    #[tokio::test]
    async fn test_every_category_resolves_exactly() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let presets = resolver.catalog().presets().to_vec();
        for preset in presets {
            let result = resolver.resolve(&preset.category).await;
            assert_eq!(result.method, ParseMethod::Preset);
            assert_eq!(result.confidence, 1.0);
            assert_eq!(result.category.as_deref(), Some(preset.category.as_str()));
            assert_eq!(result.params.as_ref(), Some(&preset.params));
        }
    }

    #[tokio::test]
    async fn test_every_phrase_resolves_in_any_case() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let presets = resolver.catalog().presets().to_vec();
        for preset in &presets {
            for phrase in &preset.phrases {
                for text in [phrase.to_lowercase(), phrase.to_uppercase(), format!("  {phrase}\t")] {
                    let result = resolver.resolve(&text).await;
                    assert_eq!(result.method, ParseMethod::Preset, "'{text}'");
                    assert_eq!(result.confidence, 1.0, "'{text}'");
                    assert_eq!(result.category.as_deref(), Some(preset.category.as_str()), "'{text}'");
                    assert_eq!(result.params.as_ref(), Some(&preset.params), "'{text}'");

                    let quick = resolver.resolve_quick(&text);
                    assert_eq!(quick.category, result.category, "'{text}'");
                    assert_eq!(quick.params, result.params, "'{text}'");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_case_and_whitespace_insensitive() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let a = resolver.resolve("  HAPPY ").await;
        let b = resolver.resolve("happy").await;
        assert_eq!(a.params, b.params);
        assert_eq!(a.category, b.category);
    }

    #[tokio::test]
    async fn test_cache_hit_returns_same_answer() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let first = resolver.resolve("gym time").await;
        assert_eq!(resolver.cached_results(), 1);

        let second = resolver.resolve("GYM TIME").await;
        assert_eq!(first.params, second.params);
        assert_eq!(first.method, second.method);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(resolver.cached_results(), 1);

        resolver.clear_cache();
        assert_eq!(resolver.cached_results(), 0);
    }

    #[tokio::test]
    async fn test_unknown_text_gets_neutral_default() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let result = resolver.resolve("xqz vbn").await;
        assert_eq!(result.method, ParseMethod::Default);
        assert!(result.params.is_some());
        assert!(result.confidence < 0.5);
    }

    #[tokio::test]
    async fn test_empty_input_is_not_cached() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let result = resolver.resolve("   ").await;
        assert_eq!(result.method, ParseMethod::Default);
        assert_eq!(resolver.cached_results(), 0);
    }

    #[test]
    fn test_quick_chain_order() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());

        let exact = resolver.resolve_quick("Chill Vibes");
        assert_eq!(exact.method, ParseMethod::Preset);
        assert_eq!(exact.confidence, 1.0);

        let partial = resolver.resolve_quick("chill vibes tonight");
        assert_eq!(partial.method, ParseMethod::Preset);
        assert!(partial.confidence < 1.0);

        let keyword = resolver.resolve_quick("ready for the gym");
        assert_eq!(keyword.method, ParseMethod::Keyword);

        let none = resolver.resolve_quick("xqz vbn");
        assert_eq!(none.method, ParseMethod::None);
        assert!(none.params.is_none());
        assert_eq!(none.confidence, 0.0);
    }

    #[test]
    fn test_quick_chain_does_not_populate_cache() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let _ = resolver.resolve_quick("happy");
        assert_eq!(resolver.cached_results(), 0);
    }

    #[tokio::test]
    async fn test_quick_chain_reads_cache() {
        let resolver = MoodResolver::offline(PresetCatalog::builtin());
        let full = resolver.resolve("xqz vbn").await;
        let quick = resolver.resolve_quick("xqz vbn");
        assert_eq!(quick.method, full.method);
        assert_eq!(quick.params, full.params);
    }

    #[tokio::test]
    async fn test_disabled_ollama_builds_offline_chain() {
        let mut config = EngineConfig::default();
        config.ollama.enabled = false;
        let resolver = MoodResolver::from_config(&config).await.unwrap();
        assert_eq!(resolver.tiers(), vec!["exact", "keyword"]);
    }
}
