//! Support collection for one endpoint pair.
//!
//! Candidate supports come from a single index query over the pair's support
//! region. Each candidate is then checked detection by detection: at the
//! detection's own epoch both endpoints are propagated with the admissible
//! accelerations, and the detection matches when it falls in the resulting
//! [`PositionWindow`] widened by its astrometric error plus
//! `detection_location_error_thresh`. The tracklet is kept when at least
//! `track_addition_threshold` of its detections match, and only matching
//! detections are added. Outliers that slip through are left to the track fit
//! and purification.
//!
//! A source is seen at most once per exposure, so for each exposure only the
//! detection closest to its window centre survives, and exposures already
//! covered by an endpoint are skipped.
use ahash::{AHashMap, AHashSet};

use crate::constants::{Degree, DetectionIndex, TrackletIndex};
use crate::kinematics::angular_distance;
use crate::link_params::LinkParams;
use crate::observations::tracklet::{Tracklet, TrackletMotion};
use crate::observations::Detection;
use crate::tracklet_tree::{PhaseBox, TrackletTree};

use super::endpoints::{position_window, AccelerationBounds};

/// A support detection kept for a candidate track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportDetection {
    pub detection: DetectionIndex,
    pub tracklet: TrackletIndex,
    /// Distance to the centre of the position window at the detection epoch (deg)
    pub distance: Degree,
}

/// Inputs shared by every support lookup of a run.
pub struct SupportContext<'a> {
    pub detections: &'a [Detection],
    pub tracklets: &'a [Tracklet],
    pub tree: &'a TrackletTree,
    pub params: &'a LinkParams,
}

impl SupportContext<'_> {
    /// Matching detections of one candidate tracklet, `None` if too few match.
    fn matching_detections(
        &self,
        tracklet: TrackletIndex,
        first: &TrackletMotion,
        last: &TrackletMotion,
        bounds: &AccelerationBounds,
    ) -> Option<Vec<SupportDetection>> {
        let indices = self.tracklets[tracklet].indices();
        let matching: Vec<SupportDetection> = indices
            .iter()
            .filter_map(|&i| {
                let det = &self.detections[i];
                let window = position_window(first, last, bounds, det.time)?;
                let tolerance = self.params.detection_location_error_thresh
                    + det.max_error(self.params.default_astrom_err);
                if !window.admits(det.ra, det.dec, tolerance) {
                    return None;
                }
                let (ra, dec) = window.center();
                Some(SupportDetection {
                    detection: i,
                    tracklet,
                    distance: angular_distance(ra, dec, det.ra, det.dec),
                })
            })
            .collect();

        let fraction = matching.len() as f64 / indices.len() as f64;
        (!matching.is_empty() && fraction >= self.params.track_addition_threshold)
            .then_some(matching)
    }

    /// Collect the support detections of the pair `(first, last)`.
    ///
    /// Arguments
    /// -----------------
    /// * `first`, `last` – the endpoint tracklets.
    /// * `region` – support region at the index reference time.
    /// * `bounds` – admissible accelerations of the pair.
    /// * `endpoint_detections` – detection indices of both endpoints.
    ///
    /// Return
    /// ----------
    /// * Support detections sorted by detection index, at most one per exposure.
    pub fn collect(
        &self,
        first: &TrackletMotion,
        last: &TrackletMotion,
        region: PhaseBox,
        bounds: &AccelerationBounds,
        endpoint_detections: &[DetectionIndex],
    ) -> Vec<SupportDetection> {
        let sep = self.params.min_support_to_endpoint_time_separation;
        let (earliest, latest) = (first.start + sep, last.start - sep);
        if earliest > latest {
            return Vec::new();
        }

        let taken: AHashSet<(u32, u64)> = endpoint_detections
            .iter()
            .map(|&i| self.detections[i].exposure_key())
            .collect();

        let mut best: AHashMap<(u32, u64), SupportDetection> = AHashMap::new();
        let candidates = self.tree.query(region, |p| {
            p.tracklet != first.tracklet
                && p.tracklet != last.tracklet
                && p.start >= earliest
                && p.start <= latest
        });
        for point in candidates {
            let Some(matching) = self.matching_detections(point.tracklet, first, last, bounds)
            else {
                continue;
            };
            for support in matching {
                let key = self.detections[support.detection].exposure_key();
                if taken.contains(&key) {
                    continue;
                }
                best.entry(key)
                    .and_modify(|kept| {
                        if (support.distance, support.detection) < (kept.distance, kept.detection) {
                            *kept = support;
                        }
                    })
                    .or_insert(support);
            }
        }

        let mut supports: Vec<SupportDetection> = best.into_values().collect();
        supports.sort_unstable_by_key(|s| s.detection);
        supports
    }
}
