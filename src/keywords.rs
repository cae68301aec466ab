//! # Keyword Heuristic
//!
//! Hand-authored English/Spanish lexicon mapping single words to partial
//! parameter sets. Every word of the input is looked up (directly, then by
//! containment), and each parameter is averaged over the matches that set it.
//! Unset parameters fall back to the neutral mood.

use crate::types::{MoodTargetParams, TempoRange, DEFAULT_TEMPO_MAX, DEFAULT_TEMPO_MIN};

/// Parameters a single lexicon word speaks to; `None` means "no opinion".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialParams {
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub tempo_min: Option<f64>,
    pub tempo_max: Option<f64>,
}

impl PartialParams {
    fn energy(mut self, v: f64) -> Self {
        self.energy = Some(v);
        self
    }

    fn valence(mut self, v: f64) -> Self {
        self.valence = Some(v);
        self
    }

    fn dance(mut self, v: f64) -> Self {
        self.danceability = Some(v);
        self
    }

    fn acoustic(mut self, v: f64) -> Self {
        self.acousticness = Some(v);
        self
    }

    fn instrumental(mut self, v: f64) -> Self {
        self.instrumentalness = Some(v);
        self
    }

    fn tempo(mut self, min: f64, max: f64) -> Self {
        self.tempo_min = Some(min);
        self.tempo_max = Some(max);
        self
    }
}

fn p() -> PartialParams {
    PartialParams::default()
}

lazy_static::lazy_static! {
    /// Ordered so that partial matching is deterministic: first hit wins.
    static ref LEXICON: Vec<(&'static str, PartialParams)> = vec![
        // English
        ("happy", p().energy(0.7).valence(0.9).dance(0.7)),
        ("joy", p().energy(0.75).valence(0.95)),
        ("cheerful", p().energy(0.7).valence(0.85)),
        ("sad", p().energy(0.25).valence(0.15).acoustic(0.7).tempo(60.0, 90.0)),
        ("cry", p().energy(0.2).valence(0.1).acoustic(0.75)),
        ("lonely", p().energy(0.25).valence(0.2)),
        ("heartbroken", p().energy(0.25).valence(0.1).acoustic(0.7)),
        ("melancholy", p().energy(0.3).valence(0.25).acoustic(0.65)),
        ("energetic", p().energy(0.9).dance(0.75).tempo(120.0, 150.0)),
        ("energy", p().energy(0.85)),
        ("hype", p().energy(0.9).valence(0.75).tempo(125.0, 150.0)),
        ("pumped", p().energy(0.9).valence(0.7)),
        ("chill", p().energy(0.3).valence(0.6).acoustic(0.6).tempo(70.0, 100.0)),
        ("relax", p().energy(0.25).valence(0.6).acoustic(0.65).tempo(65.0, 95.0)),
        ("calm", p().energy(0.2).valence(0.55).acoustic(0.7).tempo(60.0, 90.0)),
        ("peaceful", p().energy(0.15).valence(0.6).acoustic(0.8)),
        ("mellow", p().energy(0.3).valence(0.55)),
        ("focus", p().energy(0.4).dance(0.3).instrumental(0.8).tempo(80.0, 110.0)),
        ("study", p().energy(0.35).instrumental(0.8)),
        ("work", p().energy(0.45).instrumental(0.6)),
        ("party", p().energy(0.85).valence(0.8).dance(0.9).tempo(115.0, 135.0)),
        ("dance", p().energy(0.8).dance(0.9).tempo(115.0, 130.0)),
        ("club", p().energy(0.85).dance(0.9).acoustic(0.05)),
        ("romantic", p().energy(0.35).valence(0.7).acoustic(0.55)),
        ("love", p().energy(0.4).valence(0.75)),
        ("angry", p().energy(0.95).valence(0.2).tempo(130.0, 170.0)),
        ("rage", p().energy(0.95).valence(0.15)),
        ("furious", p().energy(0.95).valence(0.15)),
        ("sleep", p().energy(0.1).dance(0.2).acoustic(0.85).tempo(50.0, 80.0)),
        ("tired", p().energy(0.2).valence(0.4)),
        ("workout", p().energy(0.92).dance(0.7).tempo(125.0, 160.0)),
        ("gym", p().energy(0.9).tempo(125.0, 155.0)),
        ("run", p().energy(0.88).tempo(140.0, 170.0)),
        ("nostalgic", p().energy(0.45).valence(0.55)),
        ("dark", p().energy(0.5).valence(0.15)),
        ("epic", p().energy(0.85).valence(0.6).instrumental(0.5)),
        ("acoustic", p().acoustic(0.9)),
        ("instrumental", p().instrumental(0.9)),
        ("fast", p().energy(0.8).tempo(130.0, 170.0)),
        ("slow", p().energy(0.25).tempo(60.0, 85.0)),
        ("upbeat", p().energy(0.75).valence(0.8).dance(0.75)),
        ("morning", p().energy(0.5).valence(0.7)),
        ("night", p().energy(0.4).valence(0.45)),
        ("rain", p().energy(0.3).valence(0.35).acoustic(0.65)),
        ("summer", p().energy(0.75).valence(0.85).dance(0.75)),
        // Spanish
        ("feliz", p().energy(0.7).valence(0.9).dance(0.7)),
        ("alegre", p().energy(0.7).valence(0.85)),
        ("triste", p().energy(0.25).valence(0.15).acoustic(0.7).tempo(60.0, 90.0)),
        ("llorar", p().energy(0.2).valence(0.1)),
        ("solo", p().energy(0.3).valence(0.25)),
        ("energía", p().energy(0.85)),
        ("energia", p().energy(0.85)),
        ("tranquilo", p().energy(0.3).valence(0.6).acoustic(0.6).tempo(70.0, 100.0)),
        ("relajado", p().energy(0.25).valence(0.6).acoustic(0.65)),
        ("calma", p().energy(0.2).valence(0.55).acoustic(0.7)),
        ("estudiar", p().energy(0.35).instrumental(0.8)),
        ("trabajo", p().energy(0.45).instrumental(0.6)),
        ("fiesta", p().energy(0.85).valence(0.8).dance(0.9).tempo(115.0, 135.0)),
        ("bailar", p().energy(0.8).dance(0.9).tempo(115.0, 130.0)),
        ("romántico", p().energy(0.35).valence(0.7).acoustic(0.55)),
        ("romantico", p().energy(0.35).valence(0.7).acoustic(0.55)),
        ("amor", p().energy(0.4).valence(0.75)),
        ("enojado", p().energy(0.95).valence(0.2).tempo(130.0, 170.0)),
        ("rabia", p().energy(0.95).valence(0.15)),
        ("dormir", p().energy(0.1).dance(0.2).acoustic(0.85).tempo(50.0, 80.0)),
        ("cansado", p().energy(0.2).valence(0.4)),
        ("entrenar", p().energy(0.92).dance(0.7).tempo(125.0, 160.0)),
        ("correr", p().energy(0.88).tempo(140.0, 170.0)),
        ("nostalgia", p().energy(0.45).valence(0.55)),
        ("lluvia", p().energy(0.3).valence(0.35).acoustic(0.65)),
        ("rápido", p().energy(0.8).tempo(130.0, 170.0)),
        ("lento", p().energy(0.25).tempo(60.0, 85.0)),
        ("verano", p().energy(0.75).valence(0.85).dance(0.75)),
    ];
}

/// What the heuristic made of an input.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordAnalysis {
    pub params: MoodTargetParams,
    /// Lexicon keys that contributed, in input order.
    pub matched: Vec<&'static str>,
}

impl KeywordAnalysis {
    /// False when no word hit the lexicon and `params` is the neutral mood.
    pub fn has_signal(&self) -> bool {
        !self.matched.is_empty()
    }
}

/// Lexicon lookups with a tunable floor on partial-match word length.
///
/// Containment matching in both directions lets very short words match
/// unrelated keys (`"a"` is inside `"happy"`); raise `min_partial_len` to rein
/// that in. The default of 1 keeps every word eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatcher {
    min_partial_len: usize,
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self { min_partial_len: 1 }
    }
}

impl KeywordMatcher {
    pub const fn new(min_partial_len: usize) -> Self {
        Self { min_partial_len }
    }

    /// Direct hit first, then the first key that contains or is contained in `word`.
    pub fn lookup(&self, word: &str) -> Option<(&'static str, PartialParams)> {
        if let Some(&(key, params)) = LEXICON.iter().find(|(key, _)| *key == word) {
            return Some((key, params));
        }

        if word.chars().count() < self.min_partial_len.max(1) {
            return None;
        }

        LEXICON
            .iter()
            .find(|(key, _)| key.contains(word) || word.contains(key))
            .map(|&(key, params)| (key, params))
    }

    /// Averages every match found in `text`. Never fails.
    pub fn analyze(&self, text: &str) -> KeywordAnalysis {
        let lowered = text.to_lowercase();
        let hits: Vec<(&'static str, PartialParams)> = lowered
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|word| !word.is_empty())
            .filter_map(|word| self.lookup(word))
            .collect();

        log::trace!(
            "Keyword hits for '{}': {:?}",
            text,
            hits.iter().map(|(key, _)| *key).collect::<Vec<_>>()
        );

        let neutral = MoodTargetParams::default();
        let tempo_min = average(hits.iter().map(|(_, h)| h.tempo_min)).unwrap_or(DEFAULT_TEMPO_MIN);
        let tempo_max = average(hits.iter().map(|(_, h)| h.tempo_max)).unwrap_or(DEFAULT_TEMPO_MAX);

        let params = MoodTargetParams {
            energy: average(hits.iter().map(|(_, h)| h.energy)).unwrap_or(neutral.energy),
            valence: average(hits.iter().map(|(_, h)| h.valence)).unwrap_or(neutral.valence),
            danceability: average(hits.iter().map(|(_, h)| h.danceability))
                .unwrap_or(neutral.danceability),
            tempo_range: TempoRange::new(tempo_min, tempo_max),
            acousticness: average(hits.iter().map(|(_, h)| h.acousticness))
                .or(neutral.acousticness),
            instrumentalness: average(hits.iter().map(|(_, h)| h.instrumentalness)),
        };

        KeywordAnalysis {
            params,
            matched: hits.into_iter().map(|(key, _)| key).collect(),
        }
    }
}

fn average(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0_u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / f64::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_yields_neutral_defaults() {
        let analysis = KeywordMatcher::default().analyze("xyzzy qqq");
        assert!(!analysis.has_signal());
        assert_eq!(analysis.params.energy, 0.5);
        assert_eq!(analysis.params.valence, 0.5);
        assert_eq!(analysis.params.danceability, 0.5);
        assert_eq!(analysis.params.acousticness, Some(0.3));
        assert_eq!(analysis.params.tempo_range, TempoRange::new(80.0, 130.0));
        assert_eq!(analysis.params.instrumentalness, None);
    }

    #[test]
    fn test_single_direct_hit() {
        let analysis = KeywordMatcher::default().analyze("sad");
        assert_eq!(analysis.matched, vec!["sad"]);
        assert_eq!(analysis.params.energy, 0.25);
        assert_eq!(analysis.params.valence, 0.15);
        // danceability unspecified by "sad"
        assert_eq!(analysis.params.danceability, 0.5);
        assert_eq!(analysis.params.tempo_range, TempoRange::new(60.0, 90.0));
    }

    #[test]
    fn test_averages_only_fields_that_were_set() {
        let analysis = KeywordMatcher::default().analyze("happy energy");
        assert_eq!(analysis.matched, vec!["happy", "energy"]);
        assert!((analysis.params.energy - (0.7 + 0.85) / 2.0).abs() < 1e-9);
        // only "happy" sets valence
        assert!((analysis.params.valence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_partial_containment_both_directions() {
        let matcher = KeywordMatcher::default();
        // word contains key
        assert_eq!(matcher.lookup("sadness").map(|(k, _)| k), Some("sad"));
        assert_eq!(matcher.lookup("relaxing").map(|(k, _)| k), Some("relax"));
        // key contains word
        assert_eq!(matcher.lookup("chil").map(|(k, _)| k), Some("chill"));
    }

    #[test]
    fn test_spanish_words_match() {
        let analysis = KeywordMatcher::default().analyze("Estoy muy TRISTE hoy");
        assert!(analysis.matched.contains(&"triste"));
        assert!(analysis.params.valence < 0.5);
    }

    #[test]
    fn test_punctuation_is_stripped() {
        let analysis = KeywordMatcher::default().analyze("party!!!");
        assert_eq!(analysis.matched, vec!["party"]);
    }

    #[test]
    fn test_min_partial_len_blocks_short_words() {
        let strict = KeywordMatcher::new(4);
        assert!(strict.lookup("a").is_none());
        // direct hits are unaffected
        assert_eq!(strict.lookup("run").map(|(k, _)| k), Some("run"));

        let loose = KeywordMatcher::default();
        assert!(loose.lookup("a").is_some());
    }

    #[test]
    fn test_tempo_window_is_ordered() {
        let analysis = KeywordMatcher::default().analyze("slow fast");
        assert!(analysis.params.tempo_range.min <= analysis.params.tempo_range.max);
    }
}
