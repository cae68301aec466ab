//! Mood resolution and track selection engine.
//!
//! Free text such as "rainy sunday, a bit nostalgic" goes in; quantified
//! target parameters come out, and those drive a scorer that picks the next
//! track from a candidate pool.
//!
//! Core modules:
//! - [`resolver`] - Tiered mood resolution with result caching
//! - [`tiers`] - The individual resolution strategies
//! - [`algorithm`] - Mood fit and transition scoring
//! - [`selector`] - Weighted-random track selection
//! - [`transition`] - Cut points, crossfades and energy ramps
//! - [`queue`] - Multi-track mood queues
//!
//! ### Supporting Modules
//!
//! - [`types`] - Shared value types
//! - [`presets`] - The bundled mood preset catalog
//! - [`keywords`] - Bilingual keyword lexicon
//! - [`extraction`] - Local model prompting and answer parsing
//! - [`capability`] - Embedder and local model traits
//! - [`ollama`] - Ollama implementation of both capabilities
//! - [`camelot`] - Camelot wheel key notation
//! - [`cache`] - Bounded caches with LRU or FIFO eviction
//! - [`config`] - Configuration file handling
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use moodverter::presets::PresetCatalog;
//! use moodverter::resolver::MoodResolver;
//! use moodverter::selector::{select_next, SelectOptions};
//! use moodverter::types::Track;
//!
//! # async fn run(library: Vec<Track>) -> Option<()> {
//! let resolver = MoodResolver::offline(PresetCatalog::builtin());
//! let result = resolver.resolve("chill vibes").await;
//! let target = result.params?;
//!
//! let picked = select_next(&library, &SelectOptions::new(&target))?;
//! println!("{} - {} ({:.3})", picked.track.artist, picked.track.title, picked.total_score);
//! # Some(())
//! # }
//! ```
//!
//! ## Resolution Order
//!
//! 1. Exact preset match (confidence 1.0)
//! 2. Semantic embedding match, accepted at cosine similarity 0.75 or above
//! 3. Local model extraction (confidence 0.8)
//! 4. Keyword heuristic (confidence 0.5; 0.2 when nothing matched)
//!
//! Capabilities that are missing or unreachable simply drop their tier. The
//! public resolution methods never return an error.
//!
//! ## Scoring
//!
//! A candidate's total is `0.6 × mood + 0.4 × transition`. Mood fit compares
//! energy, valence, danceability and acousticness against the target and is
//! scaled by tempo fit. Transition quality weighs harmonic compatibility on
//! the Camelot wheel, BPM proximity (half and double time count), energy flow
//! and artist diversity.

pub mod algorithm;
pub mod cache;
pub mod camelot;
pub mod capability;
pub mod cli;
pub mod completion;
pub mod config;
pub mod extraction;
pub mod keywords;
pub mod ollama;
pub mod presets;
pub mod queue;
pub mod resolver;
pub mod selector;
pub mod tiers;
pub mod transition;
pub mod types;
