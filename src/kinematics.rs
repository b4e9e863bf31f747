//! # Sky-plane kinematics
//!
//! Pure functions for the constant-acceleration motion model used by the linker.
//! Every axis (RA, Dec) is treated independently:
//!
//! ```text
//! x(t0 + Δt) = x0 + v·Δt + ½·a·Δt²
//! ```
//!
//! Right ascension lives on a circle, so before any fit the RA values of a group
//! of detections are brought into a single continuous representation with
//! [`unwrap_ra`] (each value is shifted by ±360° to lie within 180° of a reference).
//! Propagated RA values are folded back into `[0, 360)` with [`wrap_ra`].
//!
//! Velocities are only ever fit from two or more detections (see [`fit_velocity`]).
//! Accelerations are never fit at the tracklet level; they are bounded and resolved
//! when two endpoint tracklets are paired.
use crate::constants::{Degree, DegreePerDay, DegreePerDay2, EPS_TIME, FULL_CIRCLE, HALF_CIRCLE, MJD, RADEG};
use crate::observations::Detection;

/// Position and velocity of a source at a reference epoch, from a line fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    pub reference_time: MJD,
    /// RA at `reference_time`, in `[0, 360)`
    pub ra: Degree,
    pub dec: Degree,
    pub v_ra: DegreePerDay,
    pub v_dec: DegreePerDay,
    /// Root-mean-square angular distance of the detections from the fitted line
    pub rms: Degree,
}

/// Propagate one axis under constant acceleration.
#[inline]
pub fn position_at(x0: f64, v: f64, a: f64, dt: f64) -> f64 {
    x0 + v * dt + 0.5 * a * dt * dt
}

/// Propagate a right ascension under constant acceleration, wrapped into `[0, 360)`.
#[inline]
pub fn ra_position_at(ra0: Degree, v: DegreePerDay, a: DegreePerDay2, dt: f64) -> Degree {
    wrap_ra(position_at(ra0, v, a, dt))
}

/// Advance a position and its velocity together by `dt` under constant acceleration.
#[inline]
pub fn modify_with_acceleration(position: &mut f64, velocity: &mut f64, acceleration: f64, dt: f64) {
    *position = position_at(*position, *velocity, acceleration, dt);
    *velocity += acceleration * dt;
}

/// Fold an angle into `[0, 360)`.
#[inline]
pub fn wrap_ra(ra: Degree) -> Degree {
    let r = ra.rem_euclid(FULL_CIRCLE);
    // rem_euclid may return exactly 360.0 for tiny negative inputs
    if r >= FULL_CIRCLE {
        0.0
    } else {
        r
    }
}

/// Signed smallest difference `ra - reference`, in `(-180, 180]`.
#[inline]
pub fn ra_difference(ra: Degree, reference: Degree) -> Degree {
    let d = (ra - reference).rem_euclid(FULL_CIRCLE);
    if d > HALF_CIRCLE {
        d - FULL_CIRCLE
    } else {
        d
    }
}

/// Representation of `ra` (shifted by a multiple of 360°) closest to `reference`.
#[inline]
pub fn unwrap_ra(reference: Degree, ra: Degree) -> Degree {
    reference + ra_difference(ra, reference)
}

/// Great-circle distance between two sky positions, in degrees (haversine form).
pub fn angular_distance(ra1: Degree, dec1: Degree, ra2: Degree, dec2: Degree) -> Degree {
    let (ra1, dec1, ra2, dec2) = (ra1 * RADEG, dec1 * RADEG, ra2 * RADEG, dec2 * RADEG);
    let s_dec = ((dec2 - dec1) / 2.0).sin();
    let s_ra = ((ra2 - ra1) / 2.0).sin();
    let h = s_dec * s_dec + dec1.cos() * dec2.cos() * s_ra * s_ra;
    2.0 * h.sqrt().min(1.0).asin() / RADEG
}

/// Least-squares fit of RA and Dec as linear functions of time.
///
/// Arguments
/// -----------------
/// * `detections` – the detections of one tracklet (any order, at least two epochs).
/// * `reference_time` – epoch at which position is reported.
///
/// Return
/// ----------
/// * `Some(MotionEstimate)` with the fitted position at `reference_time`, the fitted
///   velocity and the RMS distance of the detections from the line.
/// * `None` if fewer than two distinct timestamps are present (the slope is undefined).
pub fn fit_velocity(detections: &[&Detection], reference_time: MJD) -> Option<MotionEstimate> {
    let first = detections.first()?;
    let (t_min, t_max) = detections
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d.time), hi.max(d.time))
        });
    if t_max - t_min < EPS_TIME {
        return None;
    }

    let n = detections.len() as f64;
    let ra_anchor = first.ra;
    let samples: Vec<(f64, f64, f64)> = detections
        .iter()
        .map(|d| (d.time - reference_time, unwrap_ra(ra_anchor, d.ra), d.dec))
        .collect();

    let mean_t = samples.iter().map(|s| s.0).sum::<f64>() / n;
    let mean_ra = samples.iter().map(|s| s.1).sum::<f64>() / n;
    let mean_dec = samples.iter().map(|s| s.2).sum::<f64>() / n;

    let (mut stt, mut st_ra, mut st_dec) = (0.0, 0.0, 0.0);
    for &(t, ra, dec) in &samples {
        let dt = t - mean_t;
        stt += dt * dt;
        st_ra += dt * (ra - mean_ra);
        st_dec += dt * (dec - mean_dec);
    }

    let v_ra = st_ra / stt;
    let v_dec = st_dec / stt;
    let ra0 = mean_ra - v_ra * mean_t;
    let dec0 = mean_dec - v_dec * mean_t;

    let sq_sum: f64 = samples
        .iter()
        .map(|&(t, ra, dec)| {
            let d = angular_distance(ra0 + v_ra * t, dec0 + v_dec * t, ra, dec);
            d * d
        })
        .sum();

    Some(MotionEstimate {
        reference_time,
        ra: wrap_ra(ra0),
        dec: dec0,
        v_ra,
        v_dec,
        rms: (sq_sum / n).sqrt(),
    })
}
