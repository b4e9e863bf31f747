//! # Track fitting and purification
//!
//! A candidate track is accepted or rejected from a per-axis least-squares fit of
//! its detections against time:
//!
//! ```text
//! ra(t)  = c0 + c1·t + c2·t²      (t = time − epoch, RA unwrapped)
//! dec(t) = d0 + d1·t + d2·t²
//! ```
//!
//! The quadratic term is only fitted on an axis whose acceleration bound is
//! non-zero; otherwise it is fixed to 0. The system is solved with an SVD
//! (`nalgebra`), which stays stable for the near-collinear design matrices
//! produced by tracks spanning a few nights.
//!
//! Two acceptance rules are available (see [`FitAcceptance`]):
//! * RMS of the angular residuals `<= track_max_rms`,
//! * chi-square probability `P(χ² ≥ observed; dof) >= track_min_prob_chisq`, with
//!   residuals normalised by the detection errors (RA residual scaled by `cos δ`).
//!
//! [`purify`] retries a rejected candidate by dropping its worst detection, one at
//! a time, while the composition constraints still hold.
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::constants::{Degree, DetectionIndex, MJD, RADEG};
use crate::kinematics::{angular_distance, ra_difference, unwrap_ra, wrap_ra};
use crate::link_errors::LinkError;
use crate::link_params::{FitAcceptance, LinkParams};
use crate::observations::Detection;

const SVD_EPS: f64 = 1e-14;

/// Result of fitting one candidate track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFit {
    /// Time origin of the polynomials (earliest detection time)
    pub epoch: MJD,
    /// `[c0, c1, c2]` for RA (unwrapped around the first detection)
    pub ra_coeffs: [f64; 3],
    /// `[d0, d1, d2]` for Dec
    pub dec_coeffs: [f64; 3],
    /// Angular residual (deg) of each detection, in the order the indices were given
    pub residuals: Vec<Degree>,
    /// Root-mean-square of `residuals`
    pub rms: Degree,
    /// Sum of squared error-normalised residuals
    pub chi_square: f64,
    /// `2·n − fitted coefficients`
    pub dof: i64,
}

impl TrackFit {
    /// Predicted `(ra, dec)` at `time`, RA wrapped into `[0, 360)`.
    pub fn predict(&self, time: MJD) -> (Degree, Degree) {
        let t = time - self.epoch;
        (
            wrap_ra(evaluate(&self.ra_coeffs, t)),
            evaluate(&self.dec_coeffs, t),
        )
    }

    /// Fitted `(a_ra, a_dec)` in deg/day².
    pub fn acceleration(&self) -> (f64, f64) {
        (2.0 * self.ra_coeffs[2], 2.0 * self.dec_coeffs[2])
    }

    /// Probability of a chi-square at least as large as the observed one.
    /// A fit without degrees of freedom has probability 1.
    pub fn chi_square_probability(&self) -> f64 {
        if self.dof <= 0 {
            return 1.0;
        }
        match ChiSquared::new(self.dof as f64) {
            Ok(dist) => dist.sf(self.chi_square),
            Err(_) => 0.0,
        }
    }

    /// Apply the acceptance rule selected in `params`.
    pub fn is_accepted(&self, params: &LinkParams) -> bool {
        match params.fit_acceptance {
            FitAcceptance::MaxRms => self.rms <= params.track_max_rms,
            FitAcceptance::MinChiSquareProbability => {
                self.chi_square_probability() >= params.track_min_prob_chisq
            }
        }
    }

    /// Index (into the fitted indices) of the largest residual, lowest position on ties.
    fn worst_detection(&self) -> Option<usize> {
        self.residuals
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &r)| match best {
                Some((_, b)) if b >= r => best,
                _ => Some((i, r)),
            })
            .map(|(i, _)| i)
    }
}

#[inline]
fn evaluate(coeffs: &[f64; 3], t: f64) -> f64 {
    coeffs[0] + coeffs[1] * t + coeffs[2] * t * t
}

/// Least-squares polynomial of degree `degree` (1 or 2), padded to three coefficients.
fn fit_polynomial(times: &[f64], values: &[f64], degree: usize) -> Result<[f64; 3], LinkError> {
    let ncols = degree + 1;
    let a = DMatrix::<f64>::from_fn(times.len(), ncols, |r, c| times[r].powi(c as i32));
    let b = DVector::<f64>::from_column_slice(values);

    let svd = a.svd(true, true);
    if svd.rank(SVD_EPS * times.len() as f64) < ncols {
        return Err(LinkError::SingularFit(format!(
            "rank-deficient design matrix for a degree {degree} polynomial"
        )));
    }
    let x = svd
        .solve(&b, SVD_EPS)
        .map_err(|e| LinkError::SingularFit(e.to_string()))?;

    let mut coeffs = [0.0; 3];
    for (c, v) in coeffs.iter_mut().zip(x.iter()) {
        *c = *v;
    }
    Ok(coeffs)
}

/// Fit a candidate track.
///
/// Arguments
/// -----------------
/// * `detections` – the caller's detections.
/// * `indices` – detection indices of the candidate (any order, validated by the caller).
/// * `params` – acceleration bounds (which axes get a quadratic term) and the
///   default astrometric error.
///
/// Return
/// ----------
/// * `Ok(TrackFit)` with residuals aligned with `indices`.
/// * `Err(LinkError::SingularFit)` when there are fewer distinct detection times
///   than coefficients on an axis.
pub fn fit_track(
    detections: &[Detection],
    indices: &[DetectionIndex],
    params: &LinkParams,
) -> Result<TrackFit, LinkError> {
    let dets: Vec<&Detection> = indices.iter().map(|&i| &detections[i]).collect();
    let first = dets
        .first()
        .ok_or_else(|| LinkError::SingularFit("no detections to fit".into()))?;

    let degree_ra = if params.max_ra_accel > 0.0 { 2 } else { 1 };
    let degree_dec = if params.max_dec_accel > 0.0 { 2 } else { 1 };
    let needed = degree_ra.max(degree_dec) + 1;
    let distinct_times = dets.iter().map(|d| d.time.to_bits()).unique().count();
    if distinct_times < needed {
        return Err(LinkError::SingularFit(format!(
            "{distinct_times} distinct detection times, {needed} required"
        )));
    }

    let epoch = dets.iter().map(|d| d.time).fold(f64::INFINITY, f64::min);
    let times: Vec<f64> = dets.iter().map(|d| d.time - epoch).collect();
    let ra: Vec<f64> = dets.iter().map(|d| unwrap_ra(first.ra, d.ra)).collect();
    let dec: Vec<f64> = dets.iter().map(|d| d.dec).collect();

    let ra_coeffs = fit_polynomial(&times, &ra, degree_ra)?;
    let dec_coeffs = fit_polynomial(&times, &dec, degree_dec)?;

    let mut residuals = Vec::with_capacity(dets.len());
    let mut chi_square = 0.0;
    for (d, &t) in dets.iter().zip(&times) {
        let pred_ra = wrap_ra(evaluate(&ra_coeffs, t));
        let pred_dec = evaluate(&dec_coeffs, t);
        residuals.push(angular_distance(pred_ra, pred_dec, d.ra, d.dec));

        let d_ra = ra_difference(d.ra, pred_ra) * (d.dec * RADEG).cos()
            / d.effective_error_ra(params.default_astrom_err);
        let d_dec = (d.dec - pred_dec) / d.effective_error_dec(params.default_astrom_err);
        chi_square += d_ra * d_ra + d_dec * d_dec;
    }

    let rms = (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt();
    let dof = 2 * dets.len() as i64 - (degree_ra + degree_dec + 2) as i64;

    Ok(TrackFit {
        epoch,
        ra_coeffs,
        dec_coeffs,
        residuals,
        rms,
        chi_square,
        dof,
    })
}

/// True if `indices` spans enough nights and holds enough detections.
pub fn meets_composition(
    detections: &[Detection],
    indices: &[DetectionIndex],
    params: &LinkParams,
) -> bool {
    indices.len() >= params.min_detections_per_track
        && indices
            .iter()
            .map(|&i| detections[i].night())
            .unique()
            .count()
            >= params.min_unique_nights
}

/// Fit a candidate and, while it is rejected, drop its worst detection and refit.
///
/// The detection with the largest residual is removed (lowest position on ties)
/// only if the remaining set still satisfies [`meets_composition`]. The loop stops
/// at the first accepted fit or when no further removal is allowed.
///
/// Return
/// ----------
/// * `Some((indices, fit))` – the accepted detection indices (in input order) and their fit.
/// * `None` – the candidate is rejected.
pub fn purify(
    detections: &[Detection],
    indices: &[DetectionIndex],
    params: &LinkParams,
) -> Option<(Vec<DetectionIndex>, TrackFit)> {
    let mut kept = indices.to_vec();
    loop {
        let fit = fit_track(detections, &kept, params).ok()?;
        if fit.is_accepted(params) {
            return Some((kept, fit));
        }

        let worst = fit.worst_detection()?;
        let mut trial = kept.clone();
        trial.remove(worst);
        if !meets_composition(detections, &trial, params) {
            return None;
        }
        tracing::trace!(
            detection = kept[worst],
            residual = fit.residuals[worst],
            "dropping worst detection"
        );
        kept = trial;
    }
}
