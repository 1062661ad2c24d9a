// Criterion benchmarks for Closet Algo

use chrono::{Duration, Utc};
use closet_algo::core::{
    compatibility::compatibility_score,
    distance::{calculate_bounding_box, haversine_distance},
    Ranker,
};
use closet_algo::models::{Garment, Measurements, PenaltyTable, SearchFilters, UserProfile};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn create_garment(id: usize, lat: f64, lon: f64) -> Garment {
    Garment {
        id: id as i64,
        owner_id: 1000 + id as i64,
        title: format!("Garment {}", id),
        category: if id % 3 == 0 { "suit" } else { "dress" }.to_string(),
        gender: "unisex".to_string(),
        price_per_day: 20.0 + (id % 50) as f64,
        is_available: true,
        in_use: id % 17 == 0,
        measurements: Measurements {
            chest: Some(85.0 + (id % 20) as f64),
            waist: Some(65.0 + (id % 25) as f64),
            hip: if id % 2 == 0 { Some(95.0 + (id % 10) as f64) } else { None },
            ..Default::default()
        },
        rating: if id % 4 == 0 { None } else { Some(3.0 + (id % 20) as f64 / 10.0) },
        rentals_count: (id % 9) as i32,
        views_count: (id % 100) as i32,
        owner_latitude: Some(lat),
        owner_longitude: Some(lon),
        created_at: Utc::now() - Duration::minutes(id as i64),
    }
}

fn create_requester() -> UserProfile {
    UserProfile {
        id: 1,
        name: "Requester".to_string(),
        latitude: Some(-23.5505),
        longitude: Some(-46.6333),
        measurements: Some(Measurements {
            chest: Some(92.0),
            waist: Some(75.0),
            hip: Some(100.0),
            ..Default::default()
        }),
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(-23.5505),
                black_box(-46.6333),
                black_box(-22.9068),
                black_box(-43.1729),
            )
        });
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(-23.5505), black_box(-46.6333), black_box(50.0)));
    });
}

fn bench_compatibility(c: &mut Criterion) {
    let requester = create_requester();
    let measurements = requester.measurements.unwrap_or_default();
    let garment = create_garment(4, -23.56, -46.64);
    let penalties = PenaltyTable::default();

    c.bench_function("compatibility_score", |b| {
        b.iter(|| {
            compatibility_score(
                black_box(&measurements),
                black_box(&garment.measurements),
                &penalties,
                100.0,
            )
        });
    });
}

fn bench_ranking(c: &mut Criterion) {
    let ranker = Ranker::with_default_weights();
    let requester = create_requester();
    let filters = SearchFilters::default();

    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let candidates: Vec<Garment> = (0..*candidate_count)
            .map(|i| {
                let lat_offset = (i as f64 * 0.001) % 0.5;
                let lon_offset = (i as f64 * 0.001) % 0.5;
                create_garment(i, -23.5505 + lat_offset, -46.6333 + lon_offset)
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("search_and_rank", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    ranker.search_and_rank(
                        black_box(&requester),
                        black_box(candidates.clone()),
                        black_box(&filters),
                        black_box(20),
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_compatibility,
    bench_ranking
);

criterion_main!(benches);
