//! # Command-Line Interface Module
//!
//! Clap definitions for the `moodverter` binary. The binary is a thin host
//! around the library: it resolves mood text, lists presets, and picks or
//! queues tracks from JSON track files.
//!
//! ## Examples
//!
//! ```bash
//! moodverter resolve "rainy sunday, a bit nostalgic"
//! moodverter resolve --quick chill
//! moodverter pick workout --library tracks.json --history recent.json
//! moodverter queue "late night focus" --library tracks.json --length 12
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "moodverter")]
#[command(about = "Moodverter: turn how you feel into what plays next")]
#[command(version)]
pub struct Args {
    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, env = "MOODVERTER_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Never contact the local model server
    #[arg(long, global = true)]
    pub offline: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve mood text into target parameters
    ///
    /// Runs the full chain (preset, embedding, local model, keywords) unless
    /// --quick is given, in which case only the in-process strategies run and
    /// unrecognizable text resolves to nothing.
    Resolve {
        /// Mood description; multiple words are joined with spaces
        #[arg(required = true, num_args = 1.., value_hint = clap::ValueHint::Other)]
        text: Vec<String>,

        /// Skip the embedding and local model tiers
        #[arg(short, long)]
        quick: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the mood presets
    Presets {
        /// Show phrases and target parameters too
        #[arg(short, long)]
        verbose: bool,
    },

    /// Pick the next track for a mood
    Pick {
        /// Mood description
        #[arg(value_hint = clap::ValueHint::Other)]
        mood: String,

        #[command(flatten)]
        tracks: TrackSources,

        /// Candidates the weighted draw chooses among
        #[arg(long)]
        top_n: Option<usize>,

        /// Drop tracks far from the mood before scoring
        #[arg(long)]
        prefilter: bool,

        /// Also print the transition plan from the current track
        #[arg(long)]
        plan: bool,
    },

    /// Build a queue of tracks for a mood
    Queue {
        /// Mood description
        #[arg(value_hint = clap::ValueHint::Other)]
        mood: String,

        #[command(flatten)]
        tracks: TrackSources,

        /// Number of tracks to queue
        #[arg(short = 'n', long, default_value = "10")]
        length: usize,

        /// Print the queue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: moodverter completion bash > ~/.local/share/bash-completion/completions/moodverter
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Generate completions that also offer preset mood names
    ///
    /// Usage: moodverter completion-enhanced fish > ~/.config/fish/completions/moodverter.fish
    CompletionEnhanced {
        /// Shell to generate enhanced completions for (bash and fish supported)
        shell: Shell,
    },

    /// List preset moods for completion (hidden command)
    #[command(hide = true)]
    CompleteMoods {
        /// Format for this shell
        #[arg(long)]
        shell: Option<Shell>,
    },
}

/// Where candidate tracks and listening context come from.
#[derive(ClapArgs, Debug, Clone)]
pub struct TrackSources {
    /// JSON array of library tracks
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub library: PathBuf,

    /// JSON array of recommended tracks
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub recommended: Option<PathBuf>,

    /// JSON array of recently played tracks, oldest first
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub history: Option<PathBuf>,

    /// Id of the track playing now; defaults to the last history entry
    #[arg(long)]
    pub current: Option<String>,

    /// Leave recommended tracks out of the pool
    #[arg(long)]
    pub no_recommendations: bool,

    /// Fixed seed for the weighted draw
    #[arg(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_resolve_joins_words() {
        let args = Args::parse_from(["moodverter", "resolve", "--quick", "rainy", "sunday"]);
        let Command::Resolve { text, quick, json } = args.command else {
            panic!("expected resolve");
        };
        assert_eq!(text.join(" "), "rainy sunday");
        assert!(quick);
        assert!(!json);
    }

    #[test]
    fn test_queue_defaults() {
        let args = Args::parse_from(["moodverter", "--offline", "queue", "chill", "-l", "tracks.json"]);
        assert!(args.offline);
        let Command::Queue { length, tracks, .. } = args.command else {
            panic!("expected queue");
        };
        assert_eq!(length, 10);
        assert_eq!(tracks.library, PathBuf::from("tracks.json"));
        assert!(!tracks.no_recommendations);
    }
}
