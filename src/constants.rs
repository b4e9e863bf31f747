//! # Constants and type definitions for tracklink
//!
//! This module centralizes the **unit aliases**, **angle constants** and **default
//! tuning values** used throughout the crate.
//!
//! ## Overview
//!
//! - Angle and time unit aliases (all angles are in **degrees**, times in **MJD**)
//! - Circle constants used for right-ascension wraparound
//! - Defaults consumed by [`LinkParams`](crate::link_params::LinkParams)
//! - Small inline containers for per-tracklet detection indices

use smallvec::SmallVec;

// -------------------------------------------------------------------------------------------------
// Angles
// -------------------------------------------------------------------------------------------------

/// Full circle in degrees
pub const FULL_CIRCLE: f64 = 360.0;

/// Half circle in degrees
pub const HALF_CIRCLE: f64 = 180.0;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → degrees
pub const ARCSEC: f64 = 1.0 / 3600.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angular rate in degrees per day
pub type DegreePerDay = f64;
/// Angular acceleration in degrees per day²
pub type DegreePerDay2 = f64;
/// Modified Julian Date (days)
pub type MJD = f64;

/// Index of a detection in the caller's detection slice.
pub type DetectionIndex = usize;
/// Index of a tracklet in the caller's tracklet slice.
pub type TrackletIndex = usize;

/// Detection indices of a single tracklet. Tracklets are almost always pairs or
/// short runs from one night, so a handful of slots are kept inline.
pub type DetectionIndices = SmallVec<[DetectionIndex; 4]>;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Default acceleration bound on both axes (deg/day²)
pub const DEFAULT_MAX_ACCEL: DegreePerDay2 = 0.02;

/// Default minimum separation (days) between endpoint start times, and between
/// supports and endpoints
pub const DEFAULT_MIN_TIME_SEPARATION: f64 = 0.5;

/// Default slack (deg) around the support position window
pub const DEFAULT_DETECTION_LOCATION_ERROR_THRESH: Degree = 0.002;

/// Default astrometric error (deg) used when a detection has none: 0.1 arcsec
pub const DEFAULT_ASTROM_ERR: Degree = 0.1 * ARCSEC;

/// Default RMS acceptance threshold (deg)
pub const DEFAULT_TRACK_MAX_RMS: Degree = 0.001;

/// Default number of tracklets held by one index leaf
pub const DEFAULT_LEAF_SIZE: usize = 16;

/// Numerical epsilon used for time comparisons (days)
pub const EPS_TIME: f64 = 1e-9;
