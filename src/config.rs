//! # Configuration Module
//!
//! Tunables for every stage of the engine, loaded from a JSON file in the
//! platform configuration directory. Every field has a default, so a missing
//! file or a partial one is fine.
//!
//! ## Location
//!
//! - Linux: `~/.config/moodverter/config.json`
//! - macOS: `~/Library/Application Support/moodverter/config.json`
//! - Windows: `%APPDATA%\moodverter\config.json`

use crate::algorithm::ScoringContext;
use crate::cache::EvictionPolicy;
use crate::presets::PresetCatalog;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate configuration file path.
///
/// The `moodverter` directory is created if it does not exist yet.
///
/// # Errors
///
/// This function will return an error if:
/// - The system configuration directory cannot be determined
/// - The moodverter subdirectory cannot be created due to permissions
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Please ensure your platform supports standard config directories."
        )
    })?;

    let app_dir = config_dir.join("moodverter");
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create Moodverter config directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir.join("config.json"))
}

/// Mood resolution tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Parse results remembered by normalized input.
    pub cache_capacity: usize,
    /// Input embeddings remembered by normalized input.
    pub embedding_cache_capacity: usize,
    pub eviction: EvictionPolicy,
    /// Minimum cosine similarity for the embedding tier to accept.
    pub embedding_threshold: f64,
    /// Minimum similarity for a partial preset match in the quick chain.
    pub partial_match_threshold: f64,
    /// Words shorter than this only match the lexicon directly.
    pub min_partial_word_len: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            embedding_cache_capacity: 1000,
            eviction: EvictionPolicy::Lru,
            embedding_threshold: 0.75,
            partial_match_threshold: 0.6,
            min_partial_word_len: 1,
        }
    }
}

/// Where and how to reach the local Ollama server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.3,
            max_tokens: 200,
            timeout_secs: 30,
            probe_timeout_secs: 2,
        }
    }
}

/// Candidate pool and history windows for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub top_n: usize,
    /// Most recent history entries whose ids are excluded.
    pub recent_window: usize,
    /// Most recent history entries whose artists get the diversity penalty.
    pub recent_artist_window: usize,
    pub library_cap: usize,
    pub recommendation_cap: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            recent_window: 20,
            recent_artist_window: 5,
            library_cap: 500,
            recommendation_cap: 50,
        }
    }
}

/// Playback hand-over timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub before_end_ms: u64,
    pub lead_ms: u64,
    /// Crossfade when keys and tempos line up.
    pub smooth_crossfade_ms: u64,
    /// Crossfade for everything else.
    pub short_crossfade_ms: u64,
    pub ramp_steps: usize,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            before_end_ms: 10_000,
            lead_ms: 30_000,
            smooth_crossfade_ms: 8_000,
            short_crossfade_ms: 3_000,
            ramp_steps: 5,
        }
    }
}

/// Everything the engine can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resolver: ResolverConfig,
    pub ollama: OllamaConfig,
    pub scoring: ScoringContext,
    pub selection: SelectionConfig,
    pub transition: TransitionConfig,
    /// Replacement preset catalog. One carrying precomputed phrase vectors
    /// (a serialized warmed-up catalog) spares the embedding warm-up each
    /// time a resolver is built from this config.
    pub preset_catalog: Option<PathBuf>,
}

impl EngineConfig {
    /// Loads the user's config file, or defaults when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory is unavailable or the file
    /// exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = get_config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Loads configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// The configured preset catalog, falling back to the bundled one.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalog path is configured but unreadable.
    pub fn catalog(&self) -> Result<PresetCatalog> {
        match &self.preset_catalog {
            Some(path) => PresetCatalog::load(path),
            None => Ok(PresetCatalog::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_path_structure() {
        let path = get_config_path().expect("Should get valid path");
        assert!(path.to_string_lossy().ends_with("config.json"));
        let parent = path.parent().expect("Should have parent directory");
        assert_eq!(parent.file_name().unwrap(), "moodverter");
        assert!(parent.is_dir());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "resolver": { "cacheCapacity": 5 }, "selection": { "top_n": 3 } }"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.selection.top_n, 3);
        assert_eq!(config.selection.recent_window, 20);
        // unknown key ignored, field stays at default
        assert_eq!(config.resolver.cache_capacity, 100);
        assert_eq!(config.ollama, OllamaConfig::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(EngineConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_catalog_defaults_to_builtin() {
        let config = EngineConfig::default();
        assert_eq!(config.catalog().unwrap(), PresetCatalog::builtin());
    }

    #[test]
    fn test_catalog_path_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        fs::write(
            &path,
            r#"{ "presets": [{ "category": "only", "phrases": [],
                "params": { "energy": 0.1, "valence": 0.1, "danceability": 0.1,
                            "tempoRange": { "min": 70, "max": 80 } } }] }"#,
        )
        .unwrap();

        let config = EngineConfig {
            preset_catalog: Some(path),
            ..EngineConfig::default()
        };
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.presets()[0].category, "only");
    }
}
