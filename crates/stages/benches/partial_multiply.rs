//! Benchmarks for the partial multiply and the reference recommender
//!
//! Run with: cargo bench --package stages

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use data_loader::{RatingEntry, RatingIndex};
use stages::{JoinEntry, ReferenceRecommender, cross_product};

/// One source item joined against 500 users and 200 similar items
fn build_group() -> Vec<JoinEntry> {
    let users = (0..500).map(|user| JoinEntry::UserScore {
        user,
        score: (user % 5 + 1) as f64,
    });
    let items = (0..200).map(|item| JoinEntry::Similarity {
        item,
        weight: 1.0 / (item + 1) as f64,
    });
    users.chain(items).collect()
}

/// Deterministic ratings: every user rates a sliding window of items
fn build_index() -> RatingIndex {
    let ratings = (0..300u32).flat_map(|user_id| {
        (0..12u32).map(move |offset| RatingEntry {
            user_id,
            item_id: (user_id * 7 + offset * 13) % 400,
            score: ((user_id + offset) % 5 + 1) as f64,
        })
    });
    RatingIndex::from_ratings(ratings)
}

fn bench_cross_product(c: &mut Criterion) {
    let group = build_group();

    c.bench_function("cross_product_500x200", |b| {
        b.iter(|| {
            let products = cross_product(black_box(1), black_box(group.clone()));
            black_box(products)
        })
    });
}

fn bench_reference_recommend(c: &mut Criterion) {
    let index = build_index();
    let recommender = ReferenceRecommender::new(10);

    c.bench_function("reference_recommend", |b| {
        b.iter(|| {
            let recs = recommender.recommend(black_box(&index));
            black_box(recs)
        })
    });
}

criterion_group!(benches, bench_cross_product, bench_reference_recommend);
criterion_main!(benches);
