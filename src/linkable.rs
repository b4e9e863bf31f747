//! Ground-truth findability check.
//!
//! On synthetic data every detection carries the `object_id` of the source that
//! produced it. [`linkable_objects`] reports which objects the linker could find
//! in principle, given the timing and composition requirements of the
//! parameters. It ignores the motion model entirely: an object with an
//! acceleration beyond the bounds is still reported here.
//!
//! The linker never calls this; it is meant for tests and for measuring
//! completeness on simulated fields.
use ahash::AHashMap;
use itertools::Itertools;

use crate::constants::{EPS_TIME, MJD};
use crate::link_errors::LinkError;
use crate::link_params::LinkParams;
use crate::observations::tracklet::Tracklet;
use crate::observations::Detection;

/// Ground-truth label shared by every detection of `tracklet`, if any.
fn tracklet_object(tracklet: &Tracklet, detections: &[Detection]) -> Option<i64> {
    tracklet
        .indices()
        .iter()
        .map(|&i| detections[i].object_id)
        .all_equal_value()
        .ok()
        .flatten()
}

/// Objects that could be linked into a track.
///
/// Tracklets are grouped by ground-truth label (tracklets with mixed or missing
/// labels, collapsed tracklets and single-epoch tracklets are ignored). An object
/// is linkable when, taking its earliest allowed tracklet as first endpoint and
/// its latest allowed tracklet as last endpoint:
///
/// * the endpoint starts are more than `min_endpoint_time_separation` apart,
/// * the endpoints plus every tracklet starting at least
///   `min_support_to_endpoint_time_separation` from both endpoint starts hold
///   at least `min_detections_per_track` distinct detection times spread over at
///   least `min_unique_nights` nights.
///
/// Return
/// ----------
/// * `Ok(ids)` sorted ascending.
/// * `Err(LinkError)` if a tracklet is empty or references a missing detection.
pub fn linkable_objects(
    detections: &[Detection],
    tracklets: &[Tracklet],
    params: &LinkParams,
) -> Result<Vec<i64>, LinkError> {
    let mut by_object: AHashMap<i64, Vec<(MJD, &Tracklet)>> = AHashMap::new();
    for (i, tracklet) in tracklets.iter().enumerate() {
        tracklet.validate(i, detections)?;
        if tracklet.collapsed {
            continue;
        }
        let (start, end) = tracklet
            .indices()
            .iter()
            .map(|&d| detections[d].time)
            .minmax()
            .into_option()
            .ok_or(LinkError::EmptyTracklet(i))?;
        if end - start < EPS_TIME {
            continue;
        }
        if let Some(object) = tracklet_object(tracklet, detections) {
            by_object.entry(object).or_default().push((start, tracklet));
        }
    }

    let linkable = by_object
        .into_iter()
        .filter(|(_, group)| is_linkable(group, detections, params))
        .map(|(object, _)| object)
        .sorted_unstable()
        .collect();
    Ok(linkable)
}

fn is_linkable(group: &[(MJD, &Tracklet)], detections: &[Detection], params: &LinkParams) -> bool {
    let first = group
        .iter()
        .filter(|(start, _)| params.allows_first_endpoint(*start))
        .min_by(|a, b| a.0.total_cmp(&b.0));
    let last = group
        .iter()
        .filter(|(start, _)| params.allows_last_endpoint(*start))
        .max_by(|a, b| a.0.total_cmp(&b.0));
    let (Some(&(t_first, _)), Some(&(t_last, _))) = (first, last) else {
        return false;
    };
    if t_last - t_first <= params.min_endpoint_time_separation {
        return false;
    }

    let sep = params.min_support_to_endpoint_time_separation;
    let times: Vec<MJD> = group
        .iter()
        .filter(|(start, _)| {
            *start == t_first || *start == t_last || (*start >= t_first + sep && *start <= t_last - sep)
        })
        .flat_map(|(_, t)| t.indices().iter().map(|&d| detections[d].time))
        .unique_by(|t| t.to_bits())
        .collect();

    let nights = times.iter().map(|t| t.floor() as i64).unique().count();
    times.len() >= params.min_detections_per_track && nights >= params.min_unique_nights
}
