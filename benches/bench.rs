// Criterion benchmarks for compat-match

use chrono::Utc;
use compat_match::config::MatchingConfig;
use compat_match::core::{distance::haversine_distance, CompatibilityScorer, EligibilityFilter, MatchRanker};
use compat_match::models::{CandidateRecord, ProfileAttributes, UserProfile};
use compat_match::services::{InMemoryRepository, NoopTier, ScoreCache};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn create_candidate(id: usize, lat: f64, lon: f64) -> UserProfile {
    UserProfile {
        user_id: id.to_string(),
        display_name: Some(format!("User {}", id)),
        age: Some(25 + (id % 10) as u8),
        gender: Some(if id % 2 == 0 { "female" } else { "male" }.to_string()),
        country: Some(if id % 3 == 0 { "DE" } else { "NL" }.to_string()),
        latitude: Some(lat),
        longitude: Some(lon),
        photo_count: 1,
        created_at: Some(Utc::now()),
        attributes: ProfileAttributes {
            religion_id: Some((id % 4) as u32),
            marital_status_id: Some((id % 3) as u32 + 1),
            smoking_id: Some((id % 2) as u32 + 1),
            education_level: Some((id % 6) as u32),
            ..Default::default()
        },
        interest_ids: (0..(id % 12) as u32).collect(),
        ..Default::default()
    }
}

fn create_requester() -> UserProfile {
    let mut requester = create_candidate(usize::MAX / 2, 52.37, 4.90);
    requester.user_id = "current_user".to_string();
    requester.preferences.preferred_gender = Some("female".to_string());
    requester.preferences.min_age = Some(21);
    requester.preferences.max_age = Some(35);
    requester
}

fn create_pool(count: usize) -> Vec<UserProfile> {
    (0..count)
        .map(|i| {
            let offset = (i as f64 * 0.001) % 0.5;
            create_candidate(i, 52.37 + offset, 4.90 + offset)
        })
        .collect()
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(52.3676),
                black_box(4.9041),
                black_box(51.9244),
                black_box(4.4777),
            )
        });
    });
}

fn bench_scoring(c: &mut Criterion) {
    let scorer = CompatibilityScorer::with_default_weights();
    let requester = create_requester();
    let candidate = create_candidate(42, 52.36, 4.88);

    c.bench_function("compatibility_score", |b| {
        b.iter(|| scorer.score(black_box(&requester), black_box(&candidate)))
    });
}

fn bench_eligibility(c: &mut Criterion) {
    let filter = EligibilityFilter::new(&MatchingConfig::default());
    let requester = create_requester();
    let records: Vec<CandidateRecord> = create_pool(1000)
        .into_iter()
        .map(|profile| CandidateRecord {
            profile,
            ..Default::default()
        })
        .collect();
    let page = filter.page_request(1, Some(20));
    let now = Utc::now();

    c.bench_function("eligibility_1000_candidates", |b| {
        b.iter(|| filter.find_candidates(black_box(&requester), records.clone(), page, now))
    });
}

fn bench_listing(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("listing");

    for candidate_count in [10, 100, 1000].iter() {
        let repo = InMemoryRepository::new();
        repo.insert_profile(create_requester());
        for profile in create_pool(*candidate_count) {
            repo.insert_profile(profile);
        }

        // no caching tiers: every iteration scores the page from scratch
        let cache = ScoreCache::new(
            Arc::new(NoopTier),
            Arc::new(NoopTier),
            CompatibilityScorer::with_default_weights(),
            Duration::from_millis(100),
        );
        let ranker = MatchRanker::new(Arc::new(repo), Arc::new(cache), MatchingConfig::default());

        group.bench_with_input(
            BenchmarkId::new("list_matches", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| runtime.block_on(ranker.list_matches(black_box("current_user"), 1, Some(20))))
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_scoring,
    bench_eligibility,
    bench_listing
);

criterion_main!(benches);
