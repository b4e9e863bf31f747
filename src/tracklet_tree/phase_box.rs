//! Axis-aligned boxes in `(ra, dec, v_ra, v_dec)` phase space.
//!
//! RA intervals are kept in a continuous (unwrapped) representation and may
//! extend below 0° or above 360°. [`PhaseBox::intersects`] therefore also tests
//! the RA interval shifted by ±360°.
use crate::constants::{TrackletIndex, FULL_CIRCLE, MJD};

pub const RA: usize = 0;
pub const DEC: usize = 1;
pub const V_RA: usize = 2;
pub const V_DEC: usize = 3;
pub const PHASE_DIMS: usize = 4;

/// Closed interval per phase-space dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBox {
    pub lo: [f64; PHASE_DIMS],
    pub hi: [f64; PHASE_DIMS],
}

impl PhaseBox {
    /// Box `center ± half_width` (half widths are taken in absolute value).
    pub fn around(center: [f64; PHASE_DIMS], half_width: [f64; PHASE_DIMS]) -> Self {
        let mut lo = center;
        let mut hi = center;
        for d in 0..PHASE_DIMS {
            lo[d] -= half_width[d].abs();
            hi[d] += half_width[d].abs();
        }
        PhaseBox { lo, hi }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &PhaseBox) -> PhaseBox {
        let mut out = *self;
        for d in 0..PHASE_DIMS {
            out.lo[d] = out.lo[d].min(other.lo[d]);
            out.hi[d] = out.hi[d].max(other.hi[d]);
        }
        out
    }

    /// Intersection, `None` when the boxes are disjoint. RA is compared as given,
    /// without wraparound: callers align both boxes to one RA frame first.
    pub fn intersection(&self, other: &PhaseBox) -> Option<PhaseBox> {
        let mut out = *self;
        for d in 0..PHASE_DIMS {
            out.lo[d] = out.lo[d].max(other.lo[d]);
            out.hi[d] = out.hi[d].min(other.hi[d]);
        }
        (!out.is_empty()).then_some(out)
    }

    /// True if some dimension has `lo > hi` (or a NaN bound).
    pub fn is_empty(&self) -> bool {
        (0..PHASE_DIMS).any(|d| !(self.lo[d] <= self.hi[d]))
    }

    /// Overlap test with RA wraparound.
    pub fn intersects(&self, other: &PhaseBox) -> bool {
        for d in 1..PHASE_DIMS {
            if self.hi[d] < other.lo[d] || other.hi[d] < self.lo[d] {
                return false;
            }
        }
        [0.0, FULL_CIRCLE, -FULL_CIRCLE].iter().any(|shift| {
            self.lo[RA] <= other.hi[RA] + shift && other.lo[RA] + shift <= self.hi[RA]
        })
    }
}

/// A tracklet projected to the index reference time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePoint {
    pub tracklet: TrackletIndex,
    /// Start time of the tracklet
    pub start: MJD,
    /// Linearly extrapolated `(ra, dec, v_ra, v_dec)` at the reference time, RA in `[0, 360)`
    pub center: [f64; PHASE_DIMS],
    /// Padded region containing every state consistent with the tracklet
    pub bounds: PhaseBox,
}
