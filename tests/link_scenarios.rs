mod common;

use common::{Field, Motion, DET_ERR};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracklink::{
    link_tracklets, link_tracklets_with_stats, linkable_objects, FitAcceptance, LinkError,
    LinkParams, Track, TrackSet, Tracklet,
};

const THREE_NIGHTS: [f64; 3] = [5300.0, 5301.0, 5302.0];

fn link(field: &Field, params: &LinkParams) -> TrackSet {
    link_tracklets(&field.detections, &field.tracklets, params).unwrap()
}

#[test]
fn single_track() {
    let mut field = Field::new();
    let expected = field.generate_track(
        &Motion::linear(5300.0, 50.0, 50.0, 0.1, 0.1),
        &THREE_NIGHTS,
        0.01,
        0,
    );

    let tracks = link(&field, &LinkParams::default());
    assert_eq!(tracks.len(), 1);
    assert!(tracks.contains(&expected));
    let found = tracks.iter().next().unwrap();
    assert_eq!(found.tracklet_indices(), &[0, 1, 2]);
    assert!(found.rms < 1e-8);
}

#[test]
fn ten_separated_copies() {
    let mut field = Field::new();
    let base = Motion::linear(5300.0, 50.0, 50.0, 0.1, 0.1);
    let expected: TrackSet = (0..10)
        .map(|i| field.generate_track(&base.offset(0.0, 2.0 * i as f64), &THREE_NIGHTS, 0.01, i))
        .collect();

    let tracks = link(&field, &LinkParams::default());
    assert_eq!(tracks.len(), 10);
    assert_eq!(tracks, expected);
}

#[test]
fn empty_input() {
    let tracks = link_tracklets(&[], &[], &LinkParams::default()).unwrap();
    assert!(tracks.is_empty());
}

#[test]
fn ra_wraparound_both_directions() {
    for (start_ra, v_ra) in [(359.9, 0.1), (0.1, -0.1)] {
        let mut field = Field::new();
        let base = Motion::linear(5300.0, start_ra, 10.0, v_ra, 0.05);
        let expected: TrackSet = (0..10)
            .map(|i| field.generate_track(&base.offset(0.0, 1.0 * i as f64), &THREE_NIGHTS, 0.01, i))
            .collect();

        // every copy really crosses RA = 0
        let first = &field.detections[0];
        let last = &field.detections[5];
        assert!((first.ra - last.ra).abs() > 300.0);

        let tracks = link(&field, &LinkParams::default());
        assert_eq!(tracks, expected, "start_ra = {start_ra}");
    }
}

#[test]
fn acceleration_bound() {
    let nights = [5300.0, 5315.0, 5330.0];
    let params = LinkParams::builder()
        .max_ra_accel(0.02)
        .max_dec_accel(0.02)
        .leaf_size(16)
        .build()
        .unwrap();

    let mut field = Field::new();
    let base = Motion::linear(5300.0, 40.0, 0.0, 0.05, 0.05);
    let within_ra = field.generate_track(&base.with_acceleration(0.0199, 0.0), &nights, 0.01, 0);
    let within_dec = field.generate_track(
        &base.offset(0.0, 20.0).with_acceleration(0.0, -0.0199),
        &nights,
        0.01,
        1,
    );
    let beyond_ra = field.generate_track(
        &base.offset(0.0, -20.0).with_acceleration(0.021, 0.0),
        &nights,
        0.01,
        2,
    );
    let beyond_dec = field.generate_track(
        &base.offset(90.0, 0.0).with_acceleration(0.0, 0.021),
        &nights,
        0.01,
        3,
    );

    let tracks = link(&field, &params);
    assert!(tracks.contains(&within_ra));
    assert!(tracks.contains(&within_dec));
    assert!(!tracks.contains(&beyond_ra));
    assert!(!tracks.contains(&beyond_dec));
    assert_eq!(tracks.len(), 2);

    // all four objects are findable as far as timing goes
    let linkable = linkable_objects(&field.detections, &field.tracklets, &params).unwrap();
    assert_eq!(linkable, vec![0, 1, 2, 3]);
}

#[test]
fn exact_output_on_ten_track_field() {
    let nights = [5300.0, 5302.0, 5304.0];
    let mut field = Field::new();
    let expected: TrackSet = (0..10)
        .map(|i| {
            let k = i as f64;
            let motion = Motion::linear(5300.0, 30.0 + 3.0 * k, -10.0 + 2.0 * k, 0.02 * k - 0.1, 0.1 - 0.015 * k)
                .with_acceleration(0.001 * k - 0.005, 0.004 - 0.0008 * k);
            field.generate_track(&motion, &nights, 0.02, i)
        })
        .collect();

    let tracks = link(&field, &LinkParams::default());
    assert_eq!(tracks, expected);
}

#[test]
fn longer_tracks_and_subset_removal() {
    let nights = [5300.0, 5301.0, 5302.0, 5303.0];
    let mut field = Field::new();
    let full = field.generate_track(&Motion::linear(5300.0, 120.0, 30.0, -0.2, 0.1), &nights, 0.01, 0);

    let (mut tracks, stats) =
        link_tracklets_with_stats(&field.detections, &field.tracklets, &LinkParams::default()).unwrap();
    // (n0, n2), (n1, n3) and (n0, n3)
    assert_eq!(tracks.len(), 3);
    assert!(tracks.contains(&full));
    assert_eq!(stats.accepted, 3);

    assert_eq!(tracks.remove_subsets(), 2);
    assert_eq!(tracks, [full].into_iter().collect());
}

#[test]
fn linking_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut field = Field::new();
    for i in 0..20 {
        let motion = Motion::linear(
            5300.0,
            rng.random_range(0.0..360.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-0.3..0.3),
            rng.random_range(-0.3..0.3),
        );
        field.generate_track(&motion, &THREE_NIGHTS, 0.01, i);
    }

    let params = LinkParams::default();
    let a = link(&field, &params);
    let b = link(&field, &params);
    assert_eq!(a, b);
    assert_eq!(a.len(), 20);
}

#[test]
fn tighter_rms_gives_subset() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut field = Field::new();
    let mut noisy_from = 0;
    for i in 0..30 {
        if i == 15 {
            noisy_from = field.detections.len();
        }
        let motion = Motion::linear(
            5300.0,
            rng.random_range(0.0..360.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-0.3..0.3),
            rng.random_range(-0.3..0.3),
        );
        field.generate_track(&motion, &THREE_NIGHTS, 0.01, i);
    }
    // half of the objects get ~1e-5 deg of astrometric noise
    field.add_noise(&mut rng, noisy_from, 1e-5);

    let loose = LinkParams::builder().track_max_rms(1e-3).build().unwrap();
    let tight = LinkParams::builder().track_max_rms(1e-7).build().unwrap();
    let loose_tracks = link(&field, &loose);
    let tight_tracks = link(&field, &tight);

    assert_eq!(loose_tracks.len(), 30);
    assert_eq!(tight_tracks.len(), 15);
    assert!(tight_tracks.is_subset_of(&loose_tracks));
}

#[test]
fn random_field_is_complete_and_pure() {
    let mut rng = StdRng::seed_from_u64(2024);
    let nights = [5300.0, 5303.0, 5306.0];
    let mut field = Field::new();
    let mut expected = Vec::new();
    for i in 0..40 {
        let motion = Motion::linear(
            5300.0,
            rng.random_range(0.0..360.0),
            rng.random_range(-60.0..60.0),
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
        )
        .with_acceleration(rng.random_range(-0.015..0.015), rng.random_range(-0.015..0.015));
        expected.push(field.generate_track(&motion, &nights, rng.random_range(0.01..0.04), i));
    }

    let params = LinkParams::default();
    let tracks = link(&field, &params);

    for track in &expected {
        assert!(tracks.contains(track), "missing {track}");
    }
    for track in &tracks {
        let objects: Vec<Option<i64>> = track
            .detection_indices()
            .iter()
            .map(|&d| field.detections[d].object_id)
            .collect();
        assert!(objects.windows(2).all(|w| w[0] == w[1]), "mixed track {track}");
    }

    let linkable = linkable_objects(&field.detections, &field.tracklets, &params).unwrap();
    assert_eq!(linkable, (0..40).collect::<Vec<i64>>());
}

#[test]
fn noisy_detections_over_a_month() {
    let mut rng = StdRng::seed_from_u64(30);
    let nights = [5300.0, 5315.0, 5330.0];
    let mut field = Field::new();
    let expected: Vec<Track> = (0..30)
        .map(|i| {
            let (row, col) = ((i / 6) as f64, (i % 6) as f64);
            let motion = Motion::linear(5300.0, 30.0 + 8.0 * col, -20.0 + 6.0 * row, 0.1, 0.05)
                .with_acceleration(
                    0.005 + rng.random_range(-0.002..0.002),
                    -0.003 + rng.random_range(-0.002..0.002),
                );
            field.generate_track(&motion, &nights, 0.02, i)
        })
        .collect();
    // noise at the stated astrometric error of every detection
    field.add_noise(&mut rng, 0, DET_ERR);

    let (tracks, stats) =
        link_tracklets_with_stats(&field.detections, &field.tracklets, &LinkParams::default()).unwrap();
    for track in &expected {
        assert!(tracks.contains(track), "missing {track}");
    }
    assert_eq!(tracks.len(), 30, "{stats:#}");
    assert!(tracks.iter().all(|t| t.rms < 1e-4));
}

#[test]
fn malformed_input_is_rejected() {
    let mut field = Field::new();
    field.generate_track(&Motion::linear(5300.0, 50.0, 50.0, 0.1, 0.1), &THREE_NIGHTS, 0.01, 0);

    let mut tracklets = field.tracklets.clone();
    tracklets.push(Tracklet::new([]));
    assert_eq!(
        link_tracklets(&field.detections, &tracklets, &LinkParams::default()),
        Err(LinkError::EmptyTracklet(3))
    );

    let mut tracklets = field.tracklets.clone();
    tracklets[1] = Tracklet::pair(2, 99);
    assert_eq!(
        link_tracklets(&field.detections, &tracklets, &LinkParams::default()),
        Err(LinkError::DetectionIndexOutOfRange {
            tracklet: 1,
            detection: 99,
            len: 6
        })
    );
}

#[test]
fn collapsed_tracklets_are_ignored() {
    let mut field = Field::new();
    field.generate_track(&Motion::linear(5300.0, 50.0, 50.0, 0.1, 0.1), &THREE_NIGHTS, 0.01, 0);
    field.tracklets[1] = field.tracklets[1].clone().with_collapsed(true);

    let (tracks, stats) =
        link_tracklets_with_stats(&field.detections, &field.tracklets, &LinkParams::default()).unwrap();
    assert!(tracks.is_empty());
    assert_eq!(stats.collapsed_tracklets, 1);
}

#[test]
fn chi_square_acceptance() {
    let mut field = Field::new();
    let expected = field.generate_track(
        &Motion::linear(5300.0, 200.0, -20.0, 0.05, -0.12),
        &THREE_NIGHTS,
        0.01,
        0,
    );
    let params = LinkParams::builder()
        .fit_acceptance(FitAcceptance::MinChiSquareProbability)
        .build()
        .unwrap();
    let tracks = link(&field, &params);
    assert_eq!(tracks, [expected].into_iter().collect());
}

#[test]
fn longer_tracklets_and_linear_model() {
    let mut field = Field::new();
    let motion = Motion::linear(5300.0, 10.0, 5.0, 0.2, -0.1);
    let mut indices = Vec::new();
    for &n in &THREE_NIGHTS {
        indices.extend(field.add_tracklet(&motion, &[n, n + 0.01, n + 0.02], 0));
    }
    let expected = Track::from_detections(indices);

    let params = LinkParams::builder()
        .max_ra_accel(0.0)
        .max_dec_accel(0.0)
        .min_detections_per_track(9)
        .build()
        .unwrap();
    let tracks = link(&field, &params);
    assert_eq!(tracks, [expected].into_iter().collect());
}

#[test]
fn purification_drops_a_stray_tracklet() {
    let mut field = Field::new();
    let motion = Motion::linear(5300.0, 80.0, 0.0, 0.1, 0.1);
    let mut clean = Vec::new();
    for &n in &[5300.0, 5302.0, 5304.0] {
        clean.extend(field.add_tracklet(&motion, &[n, n + 0.01, n + 0.02], 0));
    }
    // a pair 1.5e-3 deg off the true path: close enough to be collected as
    // support, far enough to spoil a linear fit
    for i in field.add_tracklet(&motion, &[5303.0, 5303.01], 0) {
        field.detections[i].dec += 1.5e-3;
    }

    let params = LinkParams::builder()
        .max_ra_accel(0.0)
        .max_dec_accel(0.0)
        .track_max_rms(2e-4)
        .build()
        .unwrap();
    let (tracks, stats) =
        link_tracklets_with_stats(&field.detections, &field.tracklets, &params).unwrap();

    assert_eq!(tracks, [Track::from_detections(clean)].into_iter().collect());
    assert_eq!(stats.purified, 1);
    assert_eq!(tracks.iter().next().unwrap().tracklet_indices(), &[0, 1, 2]);
}
