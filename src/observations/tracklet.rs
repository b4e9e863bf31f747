//! # Tracklets and their motion estimates
//!
//! A [`Tracklet`] is a short-baseline group of detections (usually one night)
//! believed to belong to a single source. The linker never modifies tracklets;
//! it derives a [`TrackletMotion`] from each usable one:
//!
//! * start / end epochs of the tracklet,
//! * position at the start epoch and velocity from a least-squares line fit,
//! * a position error (worst astrometric error plus the line-fit RMS),
//! * a velocity error `2·σp / span + a_max·span`.
//!
//! The second velocity term accounts for the fitted slope being the mean velocity
//! over the span rather than the instantaneous velocity at the start epoch.
//!
//! Tracklets flagged `collapsed` by an upstream merging stage are skipped.
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, DegreePerDay, DetectionIndex, DetectionIndices, TrackletIndex, MJD};
use crate::kinematics::fit_velocity;
use crate::link_errors::LinkError;
use crate::link_params::LinkParams;
use crate::observations::Detection;

/// A set of detection indices believed to be one source over a short window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tracklet {
    indices: DetectionIndices,
    /// Set by an external collapsing stage when this tracklet was merged into another one.
    pub collapsed: bool,
}

impl Tracklet {
    /// Build a tracklet from detection indices (sorted and de-duplicated).
    pub fn new<I: IntoIterator<Item = DetectionIndex>>(indices: I) -> Self {
        let indices: DetectionIndices = indices.into_iter().sorted_unstable().dedup().collect();
        Tracklet {
            indices,
            collapsed: false,
        }
    }

    /// Convenience constructor for the common two-detection case.
    pub fn pair(first: DetectionIndex, second: DetectionIndex) -> Self {
        Self::new([first, second])
    }

    pub fn with_collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = collapsed;
        self
    }

    #[inline]
    pub fn indices(&self) -> &[DetectionIndex] {
        &self.indices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Check that the tracklet is non-empty and only references existing detections.
    ///
    /// Errors
    /// ----------
    /// * [`LinkError::EmptyTracklet`] for an empty tracklet,
    /// * [`LinkError::DetectionIndexOutOfRange`] for a dangling index.
    pub fn validate(&self, index: TrackletIndex, detections: &[Detection]) -> Result<(), LinkError> {
        if self.indices.is_empty() {
            return Err(LinkError::EmptyTracklet(index));
        }
        // indices are sorted: checking the largest one is enough
        if let Some(&last) = self.indices.last() {
            if last >= detections.len() {
                return Err(LinkError::DetectionIndexOutOfRange {
                    tracklet: index,
                    detection: last,
                    len: detections.len(),
                });
            }
        }
        Ok(())
    }

    /// Estimate position/velocity at the tracklet start.
    ///
    /// Arguments
    /// -----------------
    /// * `index` – position of this tracklet in the caller's slice.
    /// * `detections` – the caller's detections (the tracklet must have been validated).
    /// * `params` – supplies the default astrometric error and the acceleration bounds.
    ///
    /// Return
    /// ----------
    /// * `Ok(TrackletMotion)` on success,
    /// * `Err(LinkError::DegenerateTracklet)` if all detections share one timestamp.
    pub fn motion(
        &self,
        index: TrackletIndex,
        detections: &[Detection],
        params: &LinkParams,
    ) -> Result<TrackletMotion, LinkError> {
        let dets: Vec<&Detection> = self.indices.iter().map(|&i| &detections[i]).collect();
        let (start, end) = dets
            .iter()
            .map(|d| d.time)
            .minmax()
            .into_option()
            .ok_or(LinkError::EmptyTracklet(index))?;

        let estimate = fit_velocity(&dets, start).ok_or(LinkError::DegenerateTracklet(index))?;

        let astrom = dets
            .iter()
            .map(|d| d.max_error(params.default_astrom_err))
            .fold(0.0, f64::max);
        let position_err = astrom + estimate.rms;
        let span = end - start;
        let velocity_err = [
            2.0 * position_err / span + params.max_ra_accel * span,
            2.0 * position_err / span + params.max_dec_accel * span,
        ];

        Ok(TrackletMotion {
            tracklet: index,
            start,
            end,
            position: [estimate.ra, estimate.dec],
            velocity: [estimate.v_ra, estimate.v_dec],
            position_err,
            velocity_err,
        })
    }
}

/// Kinematic summary of one usable tracklet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackletMotion {
    pub tracklet: TrackletIndex,
    /// Earliest detection time
    pub start: MJD,
    /// Latest detection time
    pub end: MJD,
    /// `[ra, dec]` at `start` (RA in `[0, 360)`)
    pub position: [Degree; 2],
    /// `[v_ra, v_dec]`
    pub velocity: [DegreePerDay; 2],
    pub position_err: Degree,
    /// Per-axis velocity error `[σv_ra, σv_dec]`
    pub velocity_err: [DegreePerDay; 2],
}

impl TrackletMotion {
    #[inline]
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}
