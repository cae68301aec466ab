//! # Moodverter
//!
//! Command-line host for the mood resolution and track selection engine.
//! Tracks come from JSON files (arrays of track objects as produced by a
//! provider plus the audio analyzer); nothing is persisted between runs.
//!
//! ## Usage
//!
//! ```bash
//! moodverter resolve "something upbeat for cleaning the flat"
//! moodverter presets --verbose
//! moodverter pick party --library tracks.json --plan
//! moodverter queue chill --library tracks.json --length 15 --json
//! ```
//!
//! Logging is controlled through `RUST_LOG`:
//! - `RUST_LOG=debug moodverter resolve ...` shows every tier attempt
//! - `RUST_LOG=moodverter::algorithm=trace moodverter pick ...` shows scoring details

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use moodverter::cli::{self, Command, TrackSources};
use moodverter::completion;
use moodverter::config::EngineConfig;
use moodverter::queue::{generate_queue_with_rng, QueueRequest};
use moodverter::resolver::MoodResolver;
use moodverter::selector::{build_candidate_pool, pre_filter_tracks, PoolCaps, SelectOptions, TrackSelector};
use moodverter::transition::plan_transition;
use moodverter::types::{MoodTargetParams, ParseResult, Track};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    if args.offline {
        config.ollama.enabled = false;
    }

    match args.command {
        Command::Resolve { text, quick, json } => {
            let text = text.join(" ");
            let resolver = build_resolver(&config, quick).await?;
            let result = if quick {
                resolver.resolve_quick(&text)
            } else {
                resolver.resolve(&text).await
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_parse_result(&text, &result);
            }
        }
        Command::Presets { verbose } => {
            let catalog = config.catalog()?;
            for preset in catalog.presets() {
                if verbose {
                    println!("{}", preset.category);
                    println!("  phrases: {}", preset.phrases.join(", "));
                    println!("  {}", describe_params(&preset.params));
                } else {
                    println!("{}", preset.category);
                }
            }
        }
        Command::Pick {
            mood,
            tracks,
            top_n,
            prefilter,
            plan,
        } => {
            let target = resolve_target(&config, &mood).await?;
            let context = ListeningContext::load(&tracks, &config)?;
            let selector = TrackSelector::new(config.scoring.clone(), config.selection.clone());

            let prefiltered: Vec<Track>;
            let pool: &[Track] = if prefilter {
                prefiltered = pre_filter_tracks(&context.pool, &target).into_iter().cloned().collect();
                if prefiltered.is_empty() {
                    info!("Pre-filter removed every candidate, scoring the full pool");
                    &context.pool
                } else {
                    debug!("Pre-filter kept {} of {} candidates", prefiltered.len(), context.pool.len());
                    &prefiltered
                }
            } else {
                &context.pool
            };

            let mut options = SelectOptions::new(&target)
                .with_history(&context.history)
                .with_recommendations(!tracks.no_recommendations)
                .with_top_n(top_n.unwrap_or(config.selection.top_n));
            if let Some(current) = context.current.as_ref() {
                options = options.with_current(current);
            }

            let mut rng = seeded_rng(tracks.seed);
            let Some(picked) = selector.select_next_with_rng(pool, &options, &mut rng) else {
                anyhow::bail!("No candidate tracks in {}", tracks.library.display());
            };

            println!(
                "{} - {}  [{}]  total {:.3}  mood {:.3}  transition {:.3}",
                picked.track.artist,
                picked.track.title,
                picked.track.id,
                picked.total_score,
                picked.mood_score,
                picked.transition_score
            );

            if plan {
                if let Some(current) = context.current.as_ref() {
                    let plan = plan_transition(current, &picked.track, &config.transition)?;
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    println!("No current track, nothing to transition from");
                }
            }
        }
        Command::Queue {
            mood,
            tracks,
            length,
            json,
        } => {
            let target = resolve_target(&config, &mood).await?;
            let context = ListeningContext::load(&tracks, &config)?;
            let selector = TrackSelector::new(config.scoring.clone(), config.selection.clone());

            let request = QueueRequest {
                target: &target,
                current: context.current.as_ref(),
                history: &context.history,
                length,
                include_recommendations: !tracks.no_recommendations,
            };
            let queue = generate_queue_with_rng(
                &selector,
                &context.pool,
                &request,
                &config.transition,
                &mut seeded_rng(tracks.seed),
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&queue)?);
            } else {
                for (position, entry) in queue.iter().enumerate() {
                    let fade = entry
                        .transition
                        .as_ref()
                        .map(|t| format!("  (crossfade {} ms)", t.crossfade_ms))
                        .unwrap_or_default();
                    println!(
                        "{:>3}. {} - {}  {:.3}{fade}",
                        position + 1,
                        entry.score.track.artist,
                        entry.score.track.title,
                        entry.score.total_score
                    );
                }
            }
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        Command::CompletionEnhanced { shell } => match shell {
            cli::Shell::Bash => print!("{}", completion::enhanced_bash_completion()),
            cli::Shell::Fish => print!("{}", completion::enhanced_fish_completion()),
            _ => anyhow::bail!("Enhanced completions only supported for bash and fish"),
        },
        Command::CompleteMoods { shell } => {
            // completion scripts call this; a broken config must not break them
            let catalog = config.catalog().unwrap_or_default();
            completion::print_mood_completions(&catalog, shell);
        }
    }

    Ok(())
}

async fn build_resolver(config: &EngineConfig, quick: bool) -> Result<MoodResolver> {
    if quick {
        // the quick chain never touches capabilities, skip probing for them
        Ok(MoodResolver::builder(config.catalog()?)
            .config(config.resolver.clone())
            .build())
    } else {
        MoodResolver::from_config(config).await
    }
}

/// Full-chain resolution for commands that need a target to select with.
async fn resolve_target(config: &EngineConfig, mood: &str) -> Result<MoodTargetParams> {
    let resolver = build_resolver(config, false).await?;
    let result = resolver.resolve(mood).await;
    info!(
        "Mood '{mood}' resolved via {} (confidence {:.2})",
        result.method, result.confidence
    );
    result
        .params
        .with_context(|| format!("Could not resolve mood '{mood}'"))
}

fn print_parse_result(text: &str, result: &ParseResult) {
    println!("input:      {text}");
    println!("method:     {}", result.method);
    println!("confidence: {:.2}", result.confidence);
    if let Some(category) = &result.category {
        println!("category:   {category}");
    }
    match &result.params {
        Some(params) => println!("target:     {}", describe_params(params)),
        None => println!("target:     (none)"),
    }
    println!("time:       {} ms", result.processing_time_ms);
}

fn describe_params(params: &MoodTargetParams) -> String {
    let mut description = format!(
        "energy {:.2}, valence {:.2}, danceability {:.2}, tempo {:.0}-{:.0} BPM",
        params.energy,
        params.valence,
        params.danceability,
        params.tempo_range.min,
        params.tempo_range.max
    );
    if let Some(acousticness) = params.acousticness {
        description.push_str(&format!(", acousticness {acousticness:.2}"));
    }
    if let Some(instrumentalness) = params.instrumentalness {
        description.push_str(&format!(", instrumentalness {instrumentalness:.2}"));
    }
    description
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Candidate pool and history read from the files named on the command line.
struct ListeningContext {
    pool: Vec<Track>,
    history: Vec<Track>,
    current: Option<Track>,
}

impl ListeningContext {
    fn load(sources: &TrackSources, config: &EngineConfig) -> Result<Self> {
        let library = load_tracks(&sources.library)?;
        let recommended = match &sources.recommended {
            Some(path) => load_tracks(path)?,
            None => Vec::new(),
        };
        let history = match &sources.history {
            Some(path) => load_tracks(path)?,
            None => Vec::new(),
        };

        let pool = build_candidate_pool(&library, &recommended, PoolCaps::from(&config.selection));

        let current = match &sources.current {
            Some(id) => Some(
                pool.iter()
                    .chain(history.iter())
                    .find(|t| &t.id == id)
                    .cloned()
                    .with_context(|| format!("Current track '{id}' is in neither the pool nor the history"))?,
            ),
            None => history.last().cloned(),
        };

        Ok(Self {
            pool,
            history,
            current,
        })
    }
}

fn load_tracks(path: &Path) -> Result<Vec<Track>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tracks from {}", path.display()))?;
    let tracks: Vec<Track> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse tracks in {}", path.display()))?;
    debug!("Loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}
