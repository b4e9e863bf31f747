//! # Track search
//!
//! Links tracklets into tracks by searching over pairs of endpoint tracklets.
//!
//! ## Workflow
//!
//! 1. **Preparation** ([`TrackLinker::new`])
//!    Every tracklet is validated (empty tracklets and dangling detection indices
//!    abort the run). Collapsed tracklets are skipped, degenerate ones (a single
//!    timestamp) are excluded with a debug log. The remaining tracklets get a
//!    [`TrackletMotion`] and are indexed once in a [`TrackletTree`] at the midpoint
//!    of their start times.
//!
//! 2. **Endpoint enumeration**
//!    For each first endpoint `f`, the index is queried with `f`'s own phase box.
//!    Tracklets starting more than `min_endpoint_time_separation` after `f` whose
//!    box overlaps it are last-endpoint candidates `l`.
//!
//! 3. **Feasibility** ([`endpoints`])
//!    The pair must be reconcilable by an acceleration within the bounds. The
//!    surviving acceleration interval yields the support region.
//!
//! 4. **Support** ([`support`])
//!    One index query over the support region, then a detection-level check
//!    against the positions both endpoints allow at each detection epoch.
//!
//! 5. **Composition, fit and purification** ([`crate::track_fit`])
//!
//! First endpoints are processed in parallel with `rayon`. Each worker returns its
//! tracks and counters, which are merged in first-endpoint order, so the output
//! does not depend on the number of threads.
//!
//! ## Example
//!
//! ```rust
//! use tracklink::{link_tracklets, Detection, LinkParams, Tracklet};
//!
//! let mut detections = Vec::new();
//! let mut tracklets = Vec::new();
//! for night in 0..3 {
//!     let first = detections.len();
//!     for dt in [0.0, 0.01] {
//!         let t = 5300.0 + night as f64 + dt;
//!         let x = 50.0 + 0.1 * (t - 5300.0);
//!         detections.push(Detection::new(first as i64, t, x, x, 2.8e-5, 2.8e-5));
//!     }
//!     tracklets.push(Tracklet::pair(first, first + 1));
//! }
//!
//! let tracks = link_tracklets(&detections, &tracklets, &LinkParams::default()).unwrap();
//! assert_eq!(tracks.len(), 1);
//! ```
pub mod endpoints;
pub mod support;

use std::fmt;
use std::ops::AddAssign;

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::constants::{DetectionIndex, TrackletIndex, MJD};
use crate::link_errors::LinkError;
use crate::link_params::LinkParams;
use crate::observations::tracklet::{Tracklet, TrackletMotion};
use crate::observations::Detection;
use crate::progress::{fmt_dur, LinkProgress};
use crate::track_fit::{meets_composition, purify};
use crate::tracklet_tree::{TrackletTree, TreeParams};
use crate::tracks::{Track, TrackSet};

use self::support::SupportContext;

/// Counters collected during a run.
///
/// Fields
/// -----------------
/// * `usable_tracklets` – tracklets indexed and searched.
/// * `collapsed_tracklets` – tracklets skipped because they are flagged collapsed.
/// * `degenerate_tracklets` – tracklets excluded because their detections share one timestamp.
/// * `first_endpoints` – tracklets used as first endpoint.
/// * `pairs_considered` – endpoint pairs returned by the index.
/// * `pruned_feasibility` – pairs with no admissible acceleration or support region.
/// * `pruned_support` – pairs failing the night / detection count requirements.
/// * `candidates_fitted` – candidates handed to the fit.
/// * `rejected` – candidates whose fit could not be accepted.
/// * `accepted` – accepted candidates (duplicates included).
/// * `purified` – accepted candidates that lost detections to purification.
/// * `duplicates` – accepted tracks already present in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub usable_tracklets: usize,
    pub collapsed_tracklets: usize,
    pub degenerate_tracklets: usize,
    pub first_endpoints: usize,
    pub pairs_considered: usize,
    pub pruned_feasibility: usize,
    pub pruned_support: usize,
    pub candidates_fitted: usize,
    pub rejected: usize,
    pub accepted: usize,
    pub purified: usize,
    pub duplicates: usize,
}

impl AddAssign for LinkStats {
    fn add_assign(&mut self, rhs: Self) {
        self.usable_tracklets += rhs.usable_tracklets;
        self.collapsed_tracklets += rhs.collapsed_tracklets;
        self.degenerate_tracklets += rhs.degenerate_tracklets;
        self.first_endpoints += rhs.first_endpoints;
        self.pairs_considered += rhs.pairs_considered;
        self.pruned_feasibility += rhs.pruned_feasibility;
        self.pruned_support += rhs.pruned_support;
        self.candidates_fitted += rhs.candidates_fitted;
        self.rejected += rhs.rejected;
        self.accepted += rhs.accepted;
        self.purified += rhs.purified;
        self.duplicates += rhs.duplicates;
    }
}

impl fmt::Display for LinkStats {
    /// Compact by default; multi-line when using the alternate flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Track linking summary")?;
            writeln!(f, "---------------------")?;
            writeln!(f, "usable tracklets     : {}", self.usable_tracklets)?;
            writeln!(f, "collapsed tracklets  : {}", self.collapsed_tracklets)?;
            writeln!(f, "degenerate tracklets : {}", self.degenerate_tracklets)?;
            writeln!(f, "first endpoints      : {}", self.first_endpoints)?;
            writeln!(f, "pairs considered     : {}", self.pairs_considered)?;
            writeln!(f, "pruned (feasibility) : {}", self.pruned_feasibility)?;
            writeln!(f, "pruned (support)     : {}", self.pruned_support)?;
            writeln!(f, "candidates fitted    : {}", self.candidates_fitted)?;
            writeln!(f, "rejected             : {}", self.rejected)?;
            writeln!(f, "accepted             : {}", self.accepted)?;
            writeln!(f, "purified             : {}", self.purified)?;
            write!(f, "duplicates           : {}", self.duplicates)
        } else {
            write!(
                f,
                "tracklets={} pairs={} pruned={}+{} fitted={} accepted={} purified={} duplicates={}",
                self.usable_tracklets,
                self.pairs_considered,
                self.pruned_feasibility,
                self.pruned_support,
                self.candidates_fitted,
                self.accepted,
                self.purified,
                self.duplicates
            )
        }
    }
}

/// Terminal state of one endpoint pair.
#[derive(Debug)]
enum PairOutcome {
    Accepted { track: Track, purified: bool },
    Rejected,
    PrunedFeasibility,
    PrunedSupport,
}

impl LinkStats {
    fn record(&mut self, outcome: &PairOutcome) {
        match outcome {
            PairOutcome::Accepted { purified, .. } => {
                self.candidates_fitted += 1;
                self.accepted += 1;
                self.purified += usize::from(*purified);
            }
            PairOutcome::Rejected => {
                self.candidates_fitted += 1;
                self.rejected += 1;
            }
            PairOutcome::PrunedFeasibility => self.pruned_feasibility += 1,
            PairOutcome::PrunedSupport => self.pruned_support += 1,
        }
    }
}

/// Prepared linking run: validated input, tracklet motions and the index.
pub struct TrackLinker<'a> {
    detections: &'a [Detection],
    tracklets: &'a [Tracklet],
    params: LinkParams,
    /// Usable tracklets, sorted by start time then tracklet index
    motions: Vec<TrackletMotion>,
    /// Tracklet index → position in `motions`
    slots: Vec<Option<usize>>,
    tree: TrackletTree,
    preparation: LinkStats,
}

impl<'a> TrackLinker<'a> {
    /// Validate the input and build the tracklet index.
    ///
    /// Arguments
    /// -----------------
    /// * `detections` – all detections; tracklets refer to them by position.
    /// * `tracklets` – candidate tracklets.
    /// * `params` – linking configuration.
    ///
    /// Return
    /// ----------
    /// * `Ok(TrackLinker)` ready to [`run`](TrackLinker::run).
    /// * `Err(LinkError::EmptyTracklet)` or `Err(LinkError::DetectionIndexOutOfRange)`
    ///   for the first malformed tracklet.
    pub fn new(
        detections: &'a [Detection],
        tracklets: &'a [Tracklet],
        params: &LinkParams,
    ) -> Result<Self, LinkError> {
        for (i, tracklet) in tracklets.iter().enumerate() {
            tracklet.validate(i, detections)?;
        }

        let mut preparation = LinkStats::default();
        let estimated: Vec<Result<TrackletMotion, LinkError>> = tracklets
            .par_iter()
            .enumerate()
            .filter(|(_, t)| !t.collapsed)
            .map(|(i, t)| t.motion(i, detections, params))
            .collect();
        preparation.collapsed_tracklets = tracklets.len() - estimated.len();

        let mut motions = Vec::with_capacity(estimated.len());
        for result in estimated {
            match result {
                Ok(motion) => motions.push(motion),
                Err(LinkError::DegenerateTracklet(i)) => {
                    debug!(tracklet = i, "excluding degenerate tracklet");
                    preparation.degenerate_tracklets += 1;
                }
                Err(e) => return Err(e),
            }
        }
        motions.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.tracklet.cmp(&b.tracklet)));
        preparation.usable_tracklets = motions.len();

        let mut slots = vec![None; tracklets.len()];
        for (slot, m) in motions.iter().enumerate() {
            slots[m.tracklet] = Some(slot);
        }

        let reference_time = match (motions.first(), motions.last()) {
            (Some(a), Some(b)) => 0.5 * (a.start + b.start),
            _ => 0.0,
        };
        let tree = TrackletTree::build(
            &motions,
            TreeParams {
                reference_time,
                position_err: params.detection_location_error_thresh,
                max_ra_accel: params.max_ra_accel,
                max_dec_accel: params.max_dec_accel,
                leaf_size: params.leaf_size,
            },
        );

        Ok(TrackLinker {
            detections,
            tracklets,
            params: params.clone(),
            motions,
            slots,
            tree,
            preparation,
        })
    }

    #[inline]
    pub fn reference_time(&self) -> MJD {
        self.tree.reference_time()
    }

    #[inline]
    pub fn tree(&self) -> &TrackletTree {
        &self.tree
    }

    /// Motions of the usable tracklets, sorted by start time.
    #[inline]
    pub fn motions(&self) -> &[TrackletMotion] {
        &self.motions
    }

    #[inline]
    pub fn params(&self) -> &LinkParams {
        &self.params
    }

    /// Search every endpoint pair and collect the accepted tracks.
    pub fn run(&self) -> (TrackSet, LinkStats) {
        let firsts: Vec<&TrackletMotion> = self
            .motions
            .iter()
            .filter(|m| self.params.allows_first_endpoint(m.start))
            .collect();

        info!(
            tracklets = self.tracklets.len(),
            detections = self.detections.len(),
            usable = self.motions.len(),
            first_endpoints = firsts.len(),
            reference_time = self.reference_time(),
            tree_depth = self.tree.depth(),
            "linking tracklets"
        );

        let progress = LinkProgress::new(firsts.len());
        let per_first: Vec<(Vec<Track>, LinkStats)> = firsts
            .par_iter()
            .map(|f| {
                let out = self.search_from(f);
                progress.inc();
                out
            })
            .collect();
        let elapsed = progress.finish();

        let mut stats = self.preparation;
        stats.first_endpoints = firsts.len();
        let mut tracks = TrackSet::new();
        for (found, local) in per_first {
            stats += local;
            for track in found {
                if !tracks.insert(track) {
                    stats.duplicates += 1;
                }
            }
        }

        info!(
            tracks = tracks.len(),
            elapsed = %fmt_dur(elapsed),
            stats = %stats,
            "linking finished"
        );
        (tracks, stats)
    }

    /// All pairs starting at first endpoint `f`.
    fn search_from(&self, first: &TrackletMotion) -> (Vec<Track>, LinkStats) {
        let mut stats = LinkStats::default();
        let mut tracks = Vec::new();

        let point = self.tree.project(first);
        let min_sep = self.params.min_endpoint_time_separation;
        let lasts: Vec<TrackletIndex> = self
            .tree
            .query(point.bounds, |p| {
                p.start - first.start > min_sep && self.params.allows_last_endpoint(p.start)
            })
            .map(|p| p.tracklet)
            .sorted_unstable()
            .collect();

        let ctx = SupportContext {
            detections: self.detections,
            tracklets: self.tracklets,
            tree: &self.tree,
            params: &self.params,
        };

        for l in lasts {
            let Some(last) = self.slots[l].map(|s| &self.motions[s]) else {
                continue;
            };
            stats.pairs_considered += 1;
            let outcome = self.search_pair(first, last, &ctx);
            stats.record(&outcome);
            if let PairOutcome::Accepted { track, .. } = outcome {
                tracks.push(track);
            }
        }
        (tracks, stats)
    }

    /// Feasibility, support, composition and fit for one endpoint pair.
    fn search_pair(
        &self,
        first: &TrackletMotion,
        last: &TrackletMotion,
        ctx: &SupportContext<'_>,
    ) -> PairOutcome {
        let Some(bounds) = endpoints::acceleration_bounds(first, last, &self.params) else {
            trace!(first = first.tracklet, last = last.tracklet, "pruned: no admissible acceleration");
            return PairOutcome::PrunedFeasibility;
        };
        let Some(region) =
            endpoints::support_region(first, last, &bounds, self.tree.reference_time())
        else {
            trace!(first = first.tracklet, last = last.tracklet, "pruned: empty support region");
            return PairOutcome::PrunedFeasibility;
        };

        let endpoint_detections: Vec<DetectionIndex> = self.tracklets[first.tracklet]
            .indices()
            .iter()
            .chain(self.tracklets[last.tracklet].indices())
            .copied()
            .sorted_unstable()
            .dedup()
            .collect();
        let supports = ctx.collect(first, last, region, &bounds, &endpoint_detections);

        let candidate: Vec<DetectionIndex> = endpoint_detections
            .iter()
            .copied()
            .chain(supports.iter().map(|s| s.detection))
            .sorted_unstable()
            .dedup()
            .collect();
        if !meets_composition(self.detections, &candidate, &self.params) {
            trace!(
                first = first.tracklet,
                last = last.tracklet,
                detections = candidate.len(),
                "pruned: composition"
            );
            return PairOutcome::PrunedSupport;
        }

        let Some((kept, fit)) = purify(self.detections, &candidate, &self.params) else {
            trace!(first = first.tracklet, last = last.tracklet, "rejected by fit");
            return PairOutcome::Rejected;
        };

        let contributes = |t: TrackletIndex| {
            self.tracklets[t]
                .indices()
                .iter()
                .any(|d| kept.binary_search(d).is_ok())
        };
        let contributing: Vec<TrackletIndex> = [first.tracklet, last.tracklet]
            .into_iter()
            .chain(supports.iter().map(|s| s.tracklet))
            .filter(|&t| contributes(t))
            .collect();

        let purified = kept.len() < candidate.len();
        PairOutcome::Accepted {
            track: Track::new(kept, contributing, fit.rms),
            purified,
        }
    }
}

/// Link tracklets into tracks.
///
/// Arguments
/// -----------------
/// * `detections` – all detections; tracklets refer to them by position.
/// * `tracklets` – candidate tracklets (collapsed ones are ignored).
/// * `params` – linking configuration.
///
/// Return
/// ----------
/// * `Ok(TrackSet)` – every accepted track, without structural duplicates.
/// * `Err(LinkError)` – malformed input; no partial output is produced.
///
/// See also
/// ------------
/// * [`link_tracklets_with_stats`] – same search, also returning the run counters.
/// * [`TrackLinker`] – to inspect the prepared index before searching.
pub fn link_tracklets(
    detections: &[Detection],
    tracklets: &[Tracklet],
    params: &LinkParams,
) -> Result<TrackSet, LinkError> {
    link_tracklets_with_stats(detections, tracklets, params).map(|(tracks, _)| tracks)
}

/// [`link_tracklets`], also returning the [`LinkStats`] of the run.
pub fn link_tracklets_with_stats(
    detections: &[Detection],
    tracklets: &[Tracklet],
    params: &LinkParams,
) -> Result<(TrackSet, LinkStats), LinkError> {
    Ok(TrackLinker::new(detections, tracklets, params)?.run())
}
