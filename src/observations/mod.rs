pub mod tracklet;

use crate::constants::{Degree, MJD};
use serde::{Deserialize, Serialize};

/// A single timestamped astrometric measurement.
///
/// # Fields
///
/// * `id` - Caller-side identifier (e.g. a DIA source id); never used for indexing
/// * `time` - Epoch of the observation (MJD)
/// * `ra` - Right ascension in degrees
/// * `dec` - Declination in degrees
/// * `error_ra` - Astrometric error on RA in degrees (`<= 0` means unset)
/// * `error_dec` - Astrometric error on Dec in degrees (`<= 0` means unset)
/// * `origin` - Exposure the detection was measured on
/// * `object_id` - Ground-truth object label, when known (synthetic data)
///
/// Detections are owned by the caller and referenced by their position in the
/// caller's slice; the linker never copies them into its own structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: i64,
    pub time: MJD,
    pub ra: Degree,
    pub dec: Degree,
    pub error_ra: Degree,
    pub error_dec: Degree,
    pub origin: u32,
    pub object_id: Option<i64>,
}

impl Detection {
    /// Create a new detection with origin `0` and no ground-truth label.
    ///
    /// Arguments
    /// ---------
    /// * `id`: caller-side identifier
    /// * `time`: epoch in MJD
    /// * `ra`, `dec`: position in degrees
    /// * `error_ra`, `error_dec`: astrometric errors in degrees
    pub fn new(
        id: i64,
        time: MJD,
        ra: Degree,
        dec: Degree,
        error_ra: Degree,
        error_dec: Degree,
    ) -> Self {
        Detection {
            id,
            time,
            ra,
            dec,
            error_ra,
            error_dec,
            origin: 0,
            object_id: None,
        }
    }

    pub fn with_origin(mut self, origin: u32) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_object_id(mut self, object_id: i64) -> Self {
        self.object_id = Some(object_id);
        self
    }

    /// RA error, falling back to `default` when unset.
    #[inline]
    pub fn effective_error_ra(&self, default: Degree) -> Degree {
        effective_error(self.error_ra, default)
    }

    /// Dec error, falling back to `default` when unset.
    #[inline]
    pub fn effective_error_dec(&self, default: Degree) -> Degree {
        effective_error(self.error_dec, default)
    }

    /// Larger of the two effective errors.
    #[inline]
    pub fn max_error(&self, default: Degree) -> Degree {
        self.effective_error_ra(default)
            .max(self.effective_error_dec(default))
    }

    /// Night the detection belongs to.
    #[inline]
    pub fn night(&self) -> i64 {
        self.time.floor() as i64
    }

    /// Key identifying the exposure: two detections with the same key were
    /// measured on the same image.
    #[inline]
    pub(crate) fn exposure_key(&self) -> (u32, u64) {
        (self.origin, self.time.to_bits())
    }
}

#[inline]
fn effective_error(err: Degree, default: Degree) -> Degree {
    if err.is_finite() && err > 0.0 {
        err
    } else {
        default
    }
}
