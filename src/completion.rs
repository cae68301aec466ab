//! # Shell Completion Module
//!
//! Static completion scripts come from `clap_complete`. The enhanced scripts
//! additionally offer preset mood names for the commands that take a mood,
//! fetched at completion time through the hidden `complete-moods` command.
//!
//! ```bash
//! moodverter completion bash > ~/.local/share/bash-completion/completions/moodverter
//! moodverter completion-enhanced fish > ~/.config/fish/completions/moodverter.fish
//! ```

use crate::cli::Shell;
use crate::presets::PresetCatalog;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Fish script with mood name completion for `resolve`, `pick` and `queue`.
pub fn enhanced_fish_completion() -> &'static str {
    r"# Moodverter completion for fish with preset mood names
# Install with: moodverter completion-enhanced fish > ~/.config/fish/completions/moodverter.fish

function __moodverter_complete_moods
    if command -sq moodverter
        moodverter complete-moods --shell fish 2>/dev/null
    end
end

complete -c moodverter -e

complete -c moodverter -s h -l help -d 'Print help information'
complete -c moodverter -s V -l version -d 'Print version information'
complete -c moodverter -l config -r -F -d 'Configuration file'
complete -c moodverter -l offline -d 'Never contact the local model server'

complete -c moodverter -f -n '__fish_use_subcommand' -a 'resolve' -d 'Resolve mood text into target parameters'
complete -c moodverter -f -n '__fish_use_subcommand' -a 'presets' -d 'List the mood presets'
complete -c moodverter -f -n '__fish_use_subcommand' -a 'pick' -d 'Pick the next track for a mood'
complete -c moodverter -f -n '__fish_use_subcommand' -a 'queue' -d 'Build a queue of tracks for a mood'
complete -c moodverter -f -n '__fish_use_subcommand' -a 'completion' -d 'Generate shell completions'
complete -c moodverter -f -n '__fish_use_subcommand' -a 'completion-enhanced' -d 'Generate enhanced shell completions'

complete -c moodverter -f -n '__fish_seen_subcommand_from resolve pick queue' -a '(__moodverter_complete_moods)' -d 'Preset mood'
complete -c moodverter -f -n '__fish_seen_subcommand_from resolve' -s q -l quick -d 'Skip embedding and local model'
complete -c moodverter -f -n '__fish_seen_subcommand_from resolve queue' -l json -d 'Print JSON'
complete -c moodverter -f -n '__fish_seen_subcommand_from presets' -s v -l verbose -d 'Show phrases and parameters'
complete -c moodverter -n '__fish_seen_subcommand_from pick queue' -s l -l library -r -F -d 'Library tracks JSON'
complete -c moodverter -n '__fish_seen_subcommand_from pick queue' -s r -l recommended -r -F -d 'Recommended tracks JSON'
complete -c moodverter -n '__fish_seen_subcommand_from pick queue' -l history -r -F -d 'Recently played JSON'
complete -c moodverter -f -n '__fish_seen_subcommand_from pick queue' -l current -r -d 'Id of the playing track'
complete -c moodverter -f -n '__fish_seen_subcommand_from pick queue' -l no-recommendations -d 'Library tracks only'
complete -c moodverter -f -n '__fish_seen_subcommand_from pick queue' -l seed -r -d 'Fixed random seed'
complete -c moodverter -f -n '__fish_seen_subcommand_from queue' -s n -l length -r -d 'Tracks to queue'
complete -c moodverter -f -n '__fish_seen_subcommand_from completion completion-enhanced' -a 'bash zsh fish power-shell elvish'
"
}

/// Bash script with mood name completion for `resolve`, `pick` and `queue`.
pub fn enhanced_bash_completion() -> &'static str {
    r#"# Moodverter completion for bash with preset mood names
# Install with: moodverter completion-enhanced bash > ~/.local/share/bash-completion/completions/moodverter

_moodverter() {
    local cur prev words cword
    _init_completion || return

    local commands="resolve presets pick queue completion completion-enhanced help"

    if [[ $cword -eq 1 ]]; then
        COMPREPLY=($(compgen -W "$commands --config --offline --help --version" -- "$cur"))
        return
    fi

    case "$prev" in
        --library|-l|--recommended|-r|--history|--config)
            _filedir json
            return
            ;;
    esac

    case "${words[1]}" in
        resolve|pick|queue)
            if [[ "$cur" == -* ]]; then
                COMPREPLY=($(compgen -W "--quick --json --library --recommended --history --current --no-recommendations --seed --length --top-n --prefilter --plan" -- "$cur"))
            else
                local IFS=$'\n'
                COMPREPLY=($(compgen -W "$(moodverter complete-moods 2>/dev/null)" -- "$cur"))
            fi
            ;;
        completion|completion-enhanced)
            COMPREPLY=($(compgen -W "bash zsh fish power-shell elvish" -- "$cur"))
            ;;
    esac
}

complete -F _moodverter moodverter
"#
}

/// Every category name and phrase, sorted and deduplicated.
pub fn mood_completions(catalog: &PresetCatalog) -> Vec<String> {
    let mut completions: Vec<String> = catalog
        .presets()
        .iter()
        .flat_map(|preset| std::iter::once(&preset.category).chain(preset.phrases.iter()))
        .filter(|text| !text.is_empty())
        .cloned()
        .collect();
    completions.sort();
    completions.dedup();
    completions
}

/// One completion line, quoted for shells that split on whitespace.
pub fn format_completion(completion: &str, shell: Option<Shell>) -> String {
    match shell {
        // fish handles escaping itself
        Some(Shell::Fish) => completion.to_string(),
        _ if completion.contains(char::is_whitespace) => {
            format!("\"{}\"", completion.replace('"', "\\\""))
        }
        _ => completion.to_string(),
    }
}

pub fn print_mood_completions(catalog: &PresetCatalog, shell: Option<Shell>) {
    for completion in mood_completions(catalog) {
        println!("{}", format_completion(&completion, shell));
    }
}
