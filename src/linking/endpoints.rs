//! Feasibility of an endpoint pair.
//!
//! Given a first endpoint `f` and a last endpoint `l` starting `T` days later,
//! each axis is reconciled independently. A constant acceleration `a` links them
//! only if it lies in all of
//!
//! ```text
//! [-a_max, a_max]
//! 2·(Δp − v_f·T ± (σp_f + σp_l + σv_f·T)) / T²     (positions)
//! (v_l − v_f ± (σv_f + σv_l)) / T                   (velocities)
//! ```
//!
//! The surviving interval is then used to propagate both endpoints to the index
//! reference time. The intersection of the two propagated boxes is the region
//! every support tracklet's state must fall into.
//!
//! The same propagation, evaluated at a single detection epoch, gives the
//! [`PositionWindow`] a support detection has to lie in.
use crate::constants::{Degree, MJD, RADEG};
use crate::kinematics::{ra_difference, wrap_ra};
use crate::link_params::LinkParams;
use crate::observations::tracklet::TrackletMotion;
use crate::tracklet_tree::{PhaseBox, DEC, PHASE_DIMS, RA};

/// Per-axis acceleration interval `[lo, hi]` (index 0 → RA, 1 → Dec).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationBounds {
    pub lo: [f64; 2],
    pub hi: [f64; 2],
}

/// Endpoint position on one axis, with RA of `last` unwrapped around `first`.
#[inline]
fn axis_positions(first: &TrackletMotion, last: &TrackletMotion, axis: usize) -> (f64, f64) {
    let p_f = first.position[axis];
    let p_l = if axis == RA {
        p_f + ra_difference(last.position[axis], p_f)
    } else {
        last.position[axis]
    };
    (p_f, p_l)
}

/// Acceleration interval compatible with both endpoints, `None` if empty on any axis.
pub fn acceleration_bounds(
    first: &TrackletMotion,
    last: &TrackletMotion,
    params: &LinkParams,
) -> Option<AccelerationBounds> {
    let t = last.start - first.start;
    if t <= 0.0 {
        return None;
    }

    let mut bounds = AccelerationBounds {
        lo: [0.0; 2],
        hi: [0.0; 2],
    };
    for axis in 0..2 {
        let a_max = params.max_accel(axis);
        let (p_f, p_l) = axis_positions(first, last, axis);
        let v_f = first.velocity[axis];
        let v_l = last.velocity[axis];

        let pos_center = 2.0 * (p_l - p_f - v_f * t) / (t * t);
        let pos_half = 2.0 * (first.position_err + last.position_err + first.velocity_err[axis] * t)
            / (t * t);
        let vel_center = (v_l - v_f) / t;
        let vel_half = (first.velocity_err[axis] + last.velocity_err[axis]) / t;

        let lo = (-a_max)
            .max(pos_center - pos_half)
            .max(vel_center - vel_half);
        let hi = a_max
            .min(pos_center + pos_half)
            .min(vel_center + vel_half);
        if !(lo <= hi) {
            return None;
        }
        bounds.lo[axis] = lo;
        bounds.hi[axis] = hi;
    }
    Some(bounds)
}

/// Smallest `cos δ` used to turn an angular tolerance into an RA tolerance.
const MIN_COS_DEC: f64 = 1e-3;

/// Per-axis positions (`[ra, dec]`) consistent with both endpoints at one epoch.
///
/// RA is expressed around the first endpoint's RA and may leave `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionWindow {
    pub lo: [Degree; 2],
    pub hi: [Degree; 2],
}

impl PositionWindow {
    /// Midpoint of the window, RA wrapped into `[0, 360)`.
    pub fn center(&self) -> (Degree, Degree) {
        (
            wrap_ra(0.5 * (self.lo[RA] + self.hi[RA])),
            0.5 * (self.lo[DEC] + self.hi[DEC]),
        )
    }

    /// True if `(ra, dec)` lies in the window widened by the angular `tolerance`.
    pub fn admits(&self, ra: Degree, dec: Degree, tolerance: Degree) -> bool {
        let mid = 0.5 * (self.lo[RA] + self.hi[RA]);
        let ra = mid + ra_difference(ra, mid);
        let tol_ra = tolerance / (dec * RADEG).cos().abs().max(MIN_COS_DEC);
        self.lo[RA] - tol_ra <= ra
            && ra <= self.hi[RA] + tol_ra
            && self.lo[DEC] - tolerance <= dec
            && dec <= self.hi[DEC] + tolerance
    }
}

/// Positions the source can occupy at `time` for accelerations within `bounds`,
/// seen from both endpoints. `None` when the two propagations do not overlap.
pub fn position_window(
    first: &TrackletMotion,
    last: &TrackletMotion,
    bounds: &AccelerationBounds,
    time: MJD,
) -> Option<PositionWindow> {
    let (ra_f, ra_l) = axis_positions(first, last, RA);
    let from_first = propagate(first, [ra_f, first.position[DEC]], bounds, time);
    let from_last = propagate(last, [ra_l, last.position[DEC]], bounds, time);

    let mut window = PositionWindow {
        lo: [0.0; 2],
        hi: [0.0; 2],
    };
    for axis in [RA, DEC] {
        let lo = from_first.lo[axis].max(from_last.lo[axis]);
        let hi = from_first.hi[axis].min(from_last.hi[axis]);
        if !(lo <= hi) {
            return None;
        }
        window.lo[axis] = lo;
        window.hi[axis] = hi;
    }
    Some(window)
}

/// Box of states reachable at `reference_time` from one endpoint, for accelerations
/// within `bounds`. `position` is the endpoint position on each axis (RA already
/// expressed in the caller's frame).
fn propagate(
    motion: &TrackletMotion,
    position: [f64; 2],
    bounds: &AccelerationBounds,
    reference_time: MJD,
) -> PhaseBox {
    let dt = reference_time - motion.start;
    let mut lo = [0.0; PHASE_DIMS];
    let mut hi = [0.0; PHASE_DIMS];
    for axis in 0..2 {
        let p = position[axis] + motion.velocity[axis] * dt;
        let sigma_v = motion.velocity_err[axis];
        let sigma_p = motion.position_err + sigma_v * dt.abs();
        let half_dt2 = 0.5 * dt * dt;
        lo[axis] = p + half_dt2 * bounds.lo[axis] - sigma_p;
        hi[axis] = p + half_dt2 * bounds.hi[axis] + sigma_p;

        let (dv_a, dv_b) = (bounds.lo[axis] * dt, bounds.hi[axis] * dt);
        let v = motion.velocity[axis];
        lo[axis + 2] = v + dv_a.min(dv_b) - sigma_v;
        hi[axis + 2] = v + dv_a.max(dv_b) + sigma_v;
    }
    PhaseBox { lo, hi }
}

/// Region of phase space at `reference_time` consistent with both endpoints.
///
/// RA is expressed around the first endpoint's RA and may leave `[0, 360)`.
/// Returns `None` when the propagated boxes do not overlap.
pub fn support_region(
    first: &TrackletMotion,
    last: &TrackletMotion,
    bounds: &AccelerationBounds,
    reference_time: MJD,
) -> Option<PhaseBox> {
    let (ra_f, ra_l) = axis_positions(first, last, RA);
    let from_first = propagate(first, [ra_f, first.position[1]], bounds, reference_time);
    let from_last = propagate(last, [ra_l, last.position[1]], bounds, reference_time);
    from_first.intersection(&from_last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::modify_with_acceleration;
    use crate::tracklet_tree::V_RA;

    const SIGMA_P: f64 = 2.8e-5;

    /// Endpoint tracklet of a source starting at `(ra, dec)` with velocity `v` and
    /// acceleration `acc` on both axes, observed at `t0 + start`.
    fn endpoint(index: usize, start: f64, ra: f64, dec: f64, v: f64, acc: f64) -> TrackletMotion {
        let (mut ra, mut v_ra) = (ra, v);
        let (mut dec, mut v_dec) = (dec, v);
        modify_with_acceleration(&mut ra, &mut v_ra, acc, start);
        modify_with_acceleration(&mut dec, &mut v_dec, acc, start);
        TrackletMotion {
            tracklet: index,
            start: 5300.0 + start,
            end: 5300.0 + start + 0.01,
            position: [wrap_ra(ra), dec],
            velocity: [v_ra, v_dec],
            position_err: SIGMA_P,
            velocity_err: [2.0 * SIGMA_P / 0.01 + 0.02 * 0.01; 2],
        }
    }

    #[test]
    fn linear_pair_is_feasible() {
        let f = endpoint(0, 0.0, 50.0, 10.0, 0.1, 0.0);
        let l = endpoint(1, 2.0, 50.0, 10.0, 0.1, 0.0);
        let b = acceleration_bounds(&f, &l, &LinkParams::default()).unwrap();
        for axis in 0..2 {
            assert!(b.lo[axis] <= 0.0 && 0.0 <= b.hi[axis]);
        }

        let region = support_region(&f, &l, &b, 5301.0).unwrap();
        assert!(region.lo[RA] <= 50.1 && 50.1 <= region.hi[RA]);
        assert!(region.lo[DEC] <= 10.1 && 10.1 <= region.hi[DEC]);
        assert!(region.lo[V_RA] <= 0.1 && 0.1 <= region.hi[V_RA]);
    }

    #[test]
    fn acceleration_bound_is_enforced() {
        let params = LinkParams::default();
        let inside = endpoint(1, 30.0, 50.0, 10.0, 0.1, 0.0199);
        let start_in = endpoint(0, 0.0, 50.0, 10.0, 0.1, 0.0199);
        assert!(acceleration_bounds(&start_in, &inside, &params).is_some());

        let outside = endpoint(1, 30.0, 50.0, 10.0, 0.1, 0.021);
        let start_out = endpoint(0, 0.0, 50.0, 10.0, 0.1, 0.021);
        assert!(acceleration_bounds(&start_out, &outside, &params).is_none());
    }

    #[test]
    fn unrelated_pair_is_pruned() {
        let f = endpoint(0, 0.0, 50.0, 10.0, 0.1, 0.0);
        let l = endpoint(1, 2.0, 55.0, 10.0, 0.1, 0.0);
        assert!(acceleration_bounds(&f, &l, &LinkParams::default()).is_none());

        let same_time = endpoint(1, 0.0, 50.0, 10.0, 0.1, 0.0);
        assert!(acceleration_bounds(&f, &same_time, &LinkParams::default()).is_none());
    }

    #[test]
    fn pair_across_ra_zero() {
        for v in [0.1, -0.1] {
            let f = endpoint(0, 0.0, 359.95 + 0.1 * (0.5 - v * 5.0), 0.0, v, 0.0);
            let l = endpoint(1, 2.0, 359.95 + 0.1 * (0.5 - v * 5.0), 0.0, v, 0.0);
            assert!((f.position[RA] - l.position[RA]).abs() > 300.0);
            let b = acceleration_bounds(&f, &l, &LinkParams::default()).unwrap();
            let region = support_region(&f, &l, &b, 5301.0).unwrap();
            let expected = f.position[RA] + v;
            assert!(region.lo[RA] <= expected && expected <= region.hi[RA]);
        }
    }

    #[test]
    fn window_holds_the_accelerated_source() {
        let params = LinkParams::default();
        let f = endpoint(0, 0.0, 50.0, 10.0, 0.1, 0.01);
        let l = endpoint(1, 30.0, 50.0, 10.0, 0.1, 0.01);
        let b = acceleration_bounds(&f, &l, &params).unwrap();

        let mid = endpoint(2, 15.0, 50.0, 10.0, 0.1, 0.01);
        let w = position_window(&f, &l, &b, mid.start).unwrap();
        assert!(w.admits(mid.position[RA], mid.position[DEC], 0.0));
        // a constant-velocity guess would be off by ½·a·15² ≈ 1.1°
        assert!(!w.admits(51.5, 11.5, 0.002));

        let (ra, dec) = w.center();
        assert!((ra - mid.position[RA]).abs() < 0.05);
        assert!((dec - mid.position[DEC]).abs() < 0.05);
    }

    #[test]
    fn window_tolerance_and_ra_zero() {
        let w = PositionWindow {
            lo: [359.99, -0.01],
            hi: [360.01, 0.01],
        };
        assert!(w.admits(0.005, 0.0, 0.0));
        assert!(w.admits(359.995, 0.0, 0.0));
        assert!(!w.admits(0.02, 0.0, 0.0));
        assert!(w.admits(0.02, 0.0, 0.015));
        assert!(!w.admits(0.0, 0.02, 0.005));
        let (ra, dec) = w.center();
        assert!(ra_difference(ra, 0.0).abs() < 1e-9);
        assert!(dec.abs() < 1e-12);
    }
}
