//! Benchmarks for the full linking pass on synthetic fields.
//!
//! Run with:
//!   cargo bench --bench link_tracklets
//!   cargo bench --bench link_tracklets -- link_tracklets/objects_200
//!
//! Pin the worker count for stable numbers:
//!   RAYON_NUM_THREADS=1 cargo bench --bench link_tracklets

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tracklink::kinematics::{modify_with_acceleration, wrap_ra};
use tracklink::{link_tracklets, Detection, LinkParams, TrackLinker, Tracklet};

const NIGHTS: [f64; 3] = [5300.0, 5302.0, 5304.0];
const DET_ERR: f64 = 2.8e-5;

/// One pair per night for `n_objects` random movers inside a 20x20 deg patch.
fn synthetic_field(n_objects: usize, seed: u64) -> (Vec<Detection>, Vec<Tracklet>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut detections = Vec::with_capacity(n_objects * NIGHTS.len() * 2);
    let mut tracklets = Vec::with_capacity(n_objects * NIGHTS.len());

    for object in 0..n_objects {
        let ra0 = rng.random_range(170.0..190.0);
        let dec0 = rng.random_range(-10.0..10.0);
        let v = [rng.random_range(-0.25..0.25), rng.random_range(-0.25..0.25)];
        let a = [rng.random_range(-0.01..0.01), rng.random_range(-0.01..0.01)];
        let dt = rng.random_range(0.01..0.04);

        for night in NIGHTS {
            let first = detections.len();
            for t in [night, night + dt] {
                let (mut ra, mut v_ra) = (ra0, v[0]);
                let (mut dec, mut v_dec) = (dec0, v[1]);
                modify_with_acceleration(&mut ra, &mut v_ra, a[0], t - NIGHTS[0]);
                modify_with_acceleration(&mut dec, &mut v_dec, a[1], t - NIGHTS[0]);
                detections.push(
                    Detection::new(detections.len() as i64, t, wrap_ra(ra), dec, DET_ERR, DET_ERR)
                        .with_object_id(object as i64),
                );
            }
            tracklets.push(Tracklet::pair(first, first + 1));
        }
    }
    (detections, tracklets)
}

fn bench_link(c: &mut Criterion) {
    let params = LinkParams::default();
    let mut group = c.benchmark_group("link_tracklets");
    group.sample_size(10);

    for n in [50usize, 200, 800] {
        let (detections, tracklets) = synthetic_field(n, 0xC0FFEE);
        group.bench_with_input(BenchmarkId::new("objects", n), &n, |b, _| {
            b.iter(|| {
                let tracks = link_tracklets(black_box(&detections), black_box(&tracklets), &params)
                    .unwrap();
                black_box(tracks)
            })
        });
    }
    group.finish();
}

/// Tracklet motion estimation plus tree construction, without the search.
fn bench_index(c: &mut Criterion) {
    let params = LinkParams::default();
    let (detections, tracklets) = synthetic_field(2_000, 7);

    c.bench_function("link_tracklets/index_2000", |b| {
        b.iter(|| {
            let linker = TrackLinker::new(black_box(&detections), black_box(&tracklets), &params)
                .unwrap();
            black_box(linker.tree().depth())
        })
    });
}

criterion_group!(benches, bench_link, bench_index);
criterion_main!(benches);
