//! # Moodverter Performance Benchmarks
//!
//! ## Benchmark Categories
//!
//! - **Resolution**: exact, keyword and cached paths of the offline resolver
//! - **Scoring**: single-track scoring and ranking of large pools
//! - **Selection**: weighted selection and queue generation
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench scoring
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use moodverter::algorithm::ScoringContext;
use moodverter::config::TransitionConfig;
use moodverter::presets::PresetCatalog;
use moodverter::queue::{generate_queue_with_rng, QueueRequest};
use moodverter::resolver::MoodResolver;
use moodverter::selector::{select_next_with_rng, SelectOptions, TrackSelector};
use moodverter::types::{AudioFeatures, MoodTargetParams, Track, TrackOrigin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::hint::black_box;

fn create_test_tracks(count: usize) -> Vec<Track> {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    (0..count)
        .map(|i| Track {
            id: format!("track-{i}"),
            title: format!("Title {i}"),
            artist: format!("Artist {}", i % 97),
            duration_ms: rng.gen_range(120_000..420_000),
            features: AudioFeatures {
                energy: rng.gen(),
                valence: rng.gen(),
                tempo: rng.gen_range(60.0..180.0),
                danceability: rng.gen(),
                acousticness: rng.gen(),
                instrumentalness: rng.gen(),
                key: (i % 13 != 0).then(|| rng.gen_range(0..12)),
                mode: rng.gen_range(0..2),
            },
            play_count: 0,
            origin: TrackOrigin::Library,
        })
        .collect()
}

fn target() -> MoodTargetParams {
    PresetCatalog::builtin()
        .get("chill")
        .map(|preset| preset.params.clone())
        .unwrap_or_default()
}

fn benchmark_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    let resolver = MoodResolver::offline(PresetCatalog::builtin());

    group.bench_function("quick_exact", |b| {
        b.iter(|| resolver.resolve_quick(black_box("Chill Vibes")));
    });

    group.bench_function("quick_keyword", |b| {
        b.iter(|| resolver.resolve_quick(black_box("tired after the gym but kind of happy")));
    });

    let runtime = tokio::runtime::Runtime::new().expect("Failed to start runtime");
    group.bench_function("full_uncached", |b| {
        b.iter_batched(
            || MoodResolver::offline(PresetCatalog::builtin()),
            |fresh| runtime.block_on(async { fresh.resolve("rainy night, a bit lonely").await }),
            BatchSize::SmallInput,
        );
    });

    runtime.block_on(resolver.resolve("rainy night, a bit lonely"));
    group.bench_function("full_cached", |b| {
        b.iter(|| runtime.block_on(resolver.resolve(black_box("rainy night, a bit lonely"))));
    });

    group.finish();
}

fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let context = ScoringContext::default();
    let target = target();
    let tracks = create_test_tracks(1_000);
    let recent: HashSet<String> = ["Artist 3".to_string(), "Artist 5".to_string()].into();

    group.bench_function("single_track_score", |b| {
        b.iter(|| {
            context.score(
                black_box(&tracks[1]),
                black_box(&target),
                Some(&tracks[0]),
                &recent,
            )
        });
    });

    for size in [100, 500, 1_000] {
        group.bench_with_input(BenchmarkId::new("rank", size), &size, |b, &size| {
            b.iter(|| context.rank(&tracks[..size], &target, Some(&tracks[0]), &recent));
        });
    }

    group.finish();
}

fn benchmark_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    let target = target();
    let pool = create_test_tracks(500);
    let history: Vec<Track> = pool[..20].to_vec();

    group.bench_function("select_next_500", |b| {
        let options = SelectOptions::new(&target).with_history(&history).with_current(&pool[19]);
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| select_next_with_rng(&pool, &options, &mut rng));
    });

    group.bench_function("queue_20_from_500", |b| {
        let selector = TrackSelector::default();
        let transitions = TransitionConfig::default();
        let mut rng = StdRng::seed_from_u64(2);
        b.iter(|| {
            let request = QueueRequest {
                target: &target,
                current: None,
                history: &history,
                length: 20,
                include_recommendations: true,
            };
            generate_queue_with_rng(&selector, &pool, &request, &transitions, &mut rng)
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_resolution, benchmark_scoring, benchmark_selection);
criterion_main!(benches);
