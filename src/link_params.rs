//! # Track linking parameters
//!
//! This module defines the [`LinkParams`] configuration struct and its builder, which
//! control how the linker selects endpoint tracklets, how wide the acceleration
//! feasibility region is, which support detections are attached to a candidate,
//! and how the final least-squares fit decides acceptance.
//!
//! ## Pipeline overview
//!
//! 1. **Endpoint enumeration**
//!    Pairs of tracklets whose start times differ by more than
//!    `min_endpoint_time_separation` are considered, optionally restricted by
//!    `latest_first_endpoint_time` / `earliest_last_endpoint_time`.
//!
//! 2. **Feasibility region**
//!    The endpoint states must be reconcilable by a constant acceleration within
//!    `±max_ra_accel`, `±max_dec_accel`.
//!
//! 3. **Support collection**
//!    Tracklets starting at least `min_support_to_endpoint_time_separation` away from
//!    both endpoints are compatible when at least `track_addition_threshold` of their
//!    detections fall inside the positions both endpoints allow at that epoch,
//!    widened by the detection error plus `detection_location_error_thresh`.
//!
//! 4. **Composition and fit**
//!    A candidate needs `min_unique_nights` nights and `min_detections_per_track`
//!    detections, then must satisfy the [`FitAcceptance`] criterion, possibly after
//!    greedy removal of outlying detections.
//!
//! ## Example
//!
//! ```rust
//! use tracklink::link_params::{FitAcceptance, LinkParams};
//!
//! let params = LinkParams::builder()
//!     .max_ra_accel(0.02)
//!     .max_dec_accel(0.02)
//!     .leaf_size(8)
//!     .fit_acceptance(FitAcceptance::MinChiSquareProbability)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.leaf_size, 8);
//! ```
use crate::constants::{
    Degree, DegreePerDay2, DEFAULT_ASTROM_ERR, DEFAULT_DETECTION_LOCATION_ERROR_THRESH,
    DEFAULT_LEAF_SIZE, DEFAULT_MAX_ACCEL, DEFAULT_MIN_TIME_SEPARATION, DEFAULT_TRACK_MAX_RMS,
    MJD,
};
use crate::link_errors::LinkError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

/// How a fitted candidate track is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitAcceptance {
    /// Accept when the RMS of the angular residuals is at most `track_max_rms`.
    #[default]
    MaxRms,
    /// Accept when the chi-square probability of the normalised residuals is at
    /// least `track_min_prob_chisq`.
    MinChiSquareProbability,
}

impl fmt::Display for FitAcceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitAcceptance::MaxRms => write!(f, "max-rms"),
            FitAcceptance::MinChiSquareProbability => write!(f, "min-chisq-prob"),
        }
    }
}

/// Configuration parameters for [`link_tracklets`](crate::linking::link_tracklets).
///
/// Fields
/// -----------------
/// **Motion model**
/// * `max_ra_accel`, `max_dec_accel` – acceleration bounds (deg/day²). A zero bound
///   disables the quadratic term on that axis.
///
/// **Endpoint / support timing**
/// * `min_endpoint_time_separation` – the last endpoint must start strictly more than
///   this many days after the first one.
/// * `min_support_to_endpoint_time_separation` – supports must start at least this far
///   from both endpoint starts.
/// * `latest_first_endpoint_time` – when set, first endpoints must start no later.
/// * `earliest_last_endpoint_time` – when set, last endpoints must start no earlier.
///
/// **Composition**
/// * `min_unique_nights` – distinct `floor(MJD)` values required.
/// * `min_detections_per_track` – detections required.
///
/// **Support matching / acceptance**
/// * `detection_location_error_thresh` – slack (deg) added around the support position
///   window; also the position-error floor of the index.
/// * `track_addition_threshold` – fraction of a support tracklet's detections that must match.
/// * `track_max_rms` – RMS bound (deg) used by [`FitAcceptance::MaxRms`].
/// * `track_min_prob_chisq` – probability floor used by [`FitAcceptance::MinChiSquareProbability`].
/// * `fit_acceptance` – which of the two rules applies.
///
/// **Index / errors**
/// * `leaf_size` – maximum tracklets per index leaf (performance only).
/// * `default_astrom_err` – astrometric error (deg) assumed when a detection carries none.
///
/// Defaults
/// -----------------
/// * `max_ra_accel`, `max_dec_accel`: 0.02 deg/day²
/// * `min_endpoint_time_separation`: 0.5 d
/// * `min_support_to_endpoint_time_separation`: 0.5 d
/// * `latest_first_endpoint_time`, `earliest_last_endpoint_time`: unset
/// * `min_unique_nights`: 3
/// * `min_detections_per_track`: 6
/// * `detection_location_error_thresh`: 0.002 deg
/// * `track_addition_threshold`: 0.5
/// * `track_max_rms`: 0.001 deg
/// * `track_min_prob_chisq`: 0.9
/// * `fit_acceptance`: [`FitAcceptance::MaxRms`]
/// * `leaf_size`: 16
/// * `default_astrom_err`: 0.1 arcsec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkParams {
    // --- Motion model ---
    pub max_ra_accel: DegreePerDay2,
    pub max_dec_accel: DegreePerDay2,

    // --- Timing ---
    pub min_endpoint_time_separation: f64,
    pub min_support_to_endpoint_time_separation: f64,
    pub latest_first_endpoint_time: Option<MJD>,
    pub earliest_last_endpoint_time: Option<MJD>,

    // --- Composition ---
    pub min_unique_nights: usize,
    pub min_detections_per_track: usize,

    // --- Support matching / acceptance ---
    pub detection_location_error_thresh: Degree,
    pub track_addition_threshold: f64,
    pub track_max_rms: Degree,
    pub track_min_prob_chisq: f64,
    pub fit_acceptance: FitAcceptance,

    // --- Index / errors ---
    pub leaf_size: usize,
    pub default_astrom_err: Degree,
}

impl LinkParams {
    /// Construct a new [`LinkParams`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`LinkParamsBuilder`] initialized with the defaults.
    pub fn builder() -> LinkParamsBuilder {
        LinkParamsBuilder::new()
    }

    /// Acceleration bound for one axis: `0` → RA, anything else → Dec.
    #[inline]
    pub(crate) fn max_accel(&self, axis: usize) -> DegreePerDay2 {
        if axis == 0 {
            self.max_ra_accel
        } else {
            self.max_dec_accel
        }
    }

    /// True if `start` is allowed as the start time of a first endpoint.
    #[inline]
    pub(crate) fn allows_first_endpoint(&self, start: MJD) -> bool {
        self.latest_first_endpoint_time
            .is_none_or(|latest| start <= latest)
    }

    /// True if `start` is allowed as the start time of a last endpoint.
    #[inline]
    pub(crate) fn allows_last_endpoint(&self, start: MJD) -> bool {
        self.earliest_last_endpoint_time
            .is_none_or(|earliest| start >= earliest)
    }
}

impl Default for LinkParams {
    fn default() -> Self {
        LinkParams {
            max_ra_accel: DEFAULT_MAX_ACCEL,
            max_dec_accel: DEFAULT_MAX_ACCEL,

            min_endpoint_time_separation: DEFAULT_MIN_TIME_SEPARATION,
            min_support_to_endpoint_time_separation: DEFAULT_MIN_TIME_SEPARATION,
            latest_first_endpoint_time: None,
            earliest_last_endpoint_time: None,

            min_unique_nights: 3,
            min_detections_per_track: 6,

            detection_location_error_thresh: DEFAULT_DETECTION_LOCATION_ERROR_THRESH,
            track_addition_threshold: 0.5,
            track_max_rms: DEFAULT_TRACK_MAX_RMS,
            track_min_prob_chisq: 0.9,
            fit_acceptance: FitAcceptance::MaxRms,

            leaf_size: DEFAULT_LEAF_SIZE,
            default_astrom_err: DEFAULT_ASTROM_ERR,
        }
    }
}

/// Builder for [`LinkParams`], with validation.
#[derive(Debug, Clone)]
pub struct LinkParamsBuilder {
    params: LinkParams,
}

impl Default for LinkParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkParamsBuilder {
    /// Create a new builder initialized with default values.
    pub fn new() -> Self {
        Self {
            params: LinkParams::default(),
        }
    }

    // --- Motion model ---
    pub fn max_ra_accel(mut self, v: DegreePerDay2) -> Self {
        self.params.max_ra_accel = v;
        self
    }
    pub fn max_dec_accel(mut self, v: DegreePerDay2) -> Self {
        self.params.max_dec_accel = v;
        self
    }

    // --- Timing ---
    pub fn min_endpoint_time_separation(mut self, v: f64) -> Self {
        self.params.min_endpoint_time_separation = v;
        self
    }
    pub fn min_support_to_endpoint_time_separation(mut self, v: f64) -> Self {
        self.params.min_support_to_endpoint_time_separation = v;
        self
    }
    pub fn latest_first_endpoint_time(mut self, v: MJD) -> Self {
        self.params.latest_first_endpoint_time = Some(v);
        self
    }
    pub fn earliest_last_endpoint_time(mut self, v: MJD) -> Self {
        self.params.earliest_last_endpoint_time = Some(v);
        self
    }

    // --- Composition ---
    pub fn min_unique_nights(mut self, v: usize) -> Self {
        self.params.min_unique_nights = v;
        self
    }
    pub fn min_detections_per_track(mut self, v: usize) -> Self {
        self.params.min_detections_per_track = v;
        self
    }

    // --- Support matching / acceptance ---
    pub fn detection_location_error_thresh(mut self, v: Degree) -> Self {
        self.params.detection_location_error_thresh = v;
        self
    }
    pub fn track_addition_threshold(mut self, v: f64) -> Self {
        self.params.track_addition_threshold = v;
        self
    }
    pub fn track_max_rms(mut self, v: Degree) -> Self {
        self.params.track_max_rms = v;
        self
    }
    pub fn track_min_prob_chisq(mut self, v: f64) -> Self {
        self.params.track_min_prob_chisq = v;
        self
    }
    pub fn fit_acceptance(mut self, v: FitAcceptance) -> Self {
        self.params.fit_acceptance = v;
        self
    }

    // --- Index / errors ---
    pub fn leaf_size(mut self, v: usize) -> Self {
        self.params.leaf_size = v;
        self
    }
    pub fn default_astrom_err(mut self, v: Degree) -> Self {
        self.params.default_astrom_err = v;
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Return true iff 0.0 <= x <= 1.0 and comparable.
    #[inline]
    fn unit(x: f64) -> bool {
        Self::ge0(x) && matches!(x.partial_cmp(&1.0), Some(Less) | Some(Equal))
    }

    /// Finalize the builder and produce a [`LinkParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `max_ra_accel >= 0`, `max_dec_accel >= 0`.
    /// * `min_endpoint_time_separation >= 0`, `min_support_to_endpoint_time_separation >= 0`.
    /// * `latest_first_endpoint_time`, `earliest_last_endpoint_time` finite when set.
    /// * `min_unique_nights >= 1`, `min_detections_per_track >= 2`.
    /// * `detection_location_error_thresh > 0`, `default_astrom_err > 0`, `track_max_rms >= 0`.
    /// * `track_addition_threshold` and `track_min_prob_chisq` in `[0, 1]`.
    /// * `leaf_size >= 1`.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(LinkParams)` if every rule holds.
    /// * `Err(LinkError::InvalidLinkParameter)` naming the first violated rule.
    pub fn build(self) -> Result<LinkParams, LinkError> {
        let p = &self.params;

        if !Self::ge0(p.max_ra_accel) || !Self::ge0(p.max_dec_accel) {
            return Err(LinkError::InvalidLinkParameter(
                "acceleration bounds must be non-negative".into(),
            ));
        }
        if !Self::ge0(p.min_endpoint_time_separation)
            || !Self::ge0(p.min_support_to_endpoint_time_separation)
        {
            return Err(LinkError::InvalidLinkParameter(
                "time separations must be non-negative".into(),
            ));
        }
        if p.latest_first_endpoint_time.is_some_and(|t| !t.is_finite())
            || p.earliest_last_endpoint_time.is_some_and(|t| !t.is_finite())
        {
            return Err(LinkError::InvalidLinkParameter(
                "endpoint time windows must be finite".into(),
            ));
        }
        if p.min_unique_nights == 0 {
            return Err(LinkError::InvalidLinkParameter(
                "min_unique_nights must be >= 1".into(),
            ));
        }
        if p.min_detections_per_track < 2 {
            return Err(LinkError::InvalidLinkParameter(
                "min_detections_per_track must be >= 2".into(),
            ));
        }
        if !Self::gt0(p.detection_location_error_thresh) {
            return Err(LinkError::InvalidLinkParameter(
                "detection_location_error_thresh must be > 0".into(),
            ));
        }
        if !Self::gt0(p.default_astrom_err) {
            return Err(LinkError::InvalidLinkParameter(
                "default_astrom_err must be > 0".into(),
            ));
        }
        if !Self::ge0(p.track_max_rms) {
            return Err(LinkError::InvalidLinkParameter(
                "track_max_rms must be >= 0".into(),
            ));
        }
        if !Self::unit(p.track_addition_threshold) {
            return Err(LinkError::InvalidLinkParameter(
                "track_addition_threshold must lie in [0, 1]".into(),
            ));
        }
        if !Self::unit(p.track_min_prob_chisq) {
            return Err(LinkError::InvalidLinkParameter(
                "track_min_prob_chisq must lie in [0, 1]".into(),
            ));
        }
        if p.leaf_size == 0 {
            return Err(LinkError::InvalidLinkParameter(
                "leaf_size must be >= 1".into(),
            ));
        }

        Ok(self.params)
    }
}

fn fmt_window(t: Option<MJD>) -> String {
    match t {
        Some(t) => format!("{t:.5}"),
        None => "unset".to_string(),
    }
}

impl fmt::Display for LinkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 52;
            writeln!(f, "Track Linking Parameters")?;
            writeln!(f, "------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Motion model]")?;
            line!(
                "max_ra_accel                  = {:.4} d/d²",
                self.max_ra_accel,
                "RA acceleration bound"
            )?;
            line!(
                "max_dec_accel                 = {:.4} d/d²",
                self.max_dec_accel,
                "Dec acceleration bound"
            )?;

            writeln!(f, "\n[Endpoint / support timing]")?;
            line!(
                "min_endpoint_time_separation  = {:.3} d",
                self.min_endpoint_time_separation,
                "Gap between endpoint starts"
            )?;
            line!(
                "min_support_to_endpoint_sep   = {:.3} d",
                self.min_support_to_endpoint_time_separation,
                "Gap between supports and endpoints"
            )?;
            line!(
                "latest_first_endpoint_time    = {}",
                fmt_window(self.latest_first_endpoint_time),
                "First endpoint window"
            )?;
            line!(
                "earliest_last_endpoint_time   = {}",
                fmt_window(self.earliest_last_endpoint_time),
                "Last endpoint window"
            )?;

            writeln!(f, "\n[Composition]")?;
            line!(
                "min_unique_nights             = {}",
                self.min_unique_nights,
                "Distinct nights per track"
            )?;
            line!(
                "min_detections_per_track      = {}",
                self.min_detections_per_track,
                "Detections per track"
            )?;

            writeln!(f, "\n[Support matching / acceptance]")?;
            line!(
                "detection_location_error      = {:.1e} deg",
                self.detection_location_error_thresh,
                "Support matching radius"
            )?;
            line!(
                "track_addition_threshold      = {:.2}",
                self.track_addition_threshold,
                "Matching fraction per support"
            )?;
            line!(
                "track_max_rms                 = {:.1e} deg",
                self.track_max_rms,
                "RMS acceptance bound"
            )?;
            line!(
                "track_min_prob_chisq          = {:.3}",
                self.track_min_prob_chisq,
                "Chi-square acceptance floor"
            )?;
            line!(
                "fit_acceptance                = {}",
                self.fit_acceptance,
                "Acceptance rule"
            )?;

            writeln!(f, "\n[Index / errors]")?;
            line!(
                "leaf_size                     = {}",
                self.leaf_size,
                "Tracklets per index leaf"
            )?;
            line!(
                "default_astrom_err            = {:.1e} deg",
                self.default_astrom_err,
                "Error for unset detections"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "LinkParams(accel≤({:.4},{:.4}) d/d², endpoint_sep>{:.2}d, support_sep≥{:.2}d, nights≥{}, dets≥{}, rms≤{:.1e}, accept={}, leaf={})",
                self.max_ra_accel,
                self.max_dec_accel,
                self.min_endpoint_time_separation,
                self.min_support_to_endpoint_time_separation,
                self.min_unique_nights,
                self.min_detections_per_track,
                self.track_max_rms,
                self.fit_acceptance,
                self.leaf_size,
            )
        }
    }
}
