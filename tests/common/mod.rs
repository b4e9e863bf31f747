#![allow(dead_code)]

use tracklink::kinematics::{modify_with_acceleration, wrap_ra};
use tracklink::{Detection, Track, Tracklet};

/// Astrometric error attached to synthetic detections (0.1 arcsec).
pub const DET_ERR: f64 = 2.8e-5;

/// Detections and tracklets of a synthetic field.
#[derive(Debug, Default, Clone)]
pub struct Field {
    pub detections: Vec<Detection>,
    pub tracklets: Vec<Tracklet>,
}

/// Constant-acceleration sky motion, referenced to `epoch`.
#[derive(Debug, Clone, Copy)]
pub struct Motion {
    pub epoch: f64,
    pub ra: f64,
    pub dec: f64,
    pub v_ra: f64,
    pub v_dec: f64,
    pub a_ra: f64,
    pub a_dec: f64,
}

impl Motion {
    pub fn linear(epoch: f64, ra: f64, dec: f64, v_ra: f64, v_dec: f64) -> Self {
        Motion {
            epoch,
            ra,
            dec,
            v_ra,
            v_dec,
            a_ra: 0.0,
            a_dec: 0.0,
        }
    }

    pub fn with_acceleration(mut self, a_ra: f64, a_dec: f64) -> Self {
        self.a_ra = a_ra;
        self.a_dec = a_dec;
        self
    }

    pub fn offset(mut self, d_ra: f64, d_dec: f64) -> Self {
        self.ra = wrap_ra(self.ra + d_ra);
        self.dec += d_dec;
        self
    }

    /// `(ra, dec)` at `time`.
    pub fn position_at(&self, time: f64) -> (f64, f64) {
        let dt = time - self.epoch;
        let (mut ra, mut v_ra) = (self.ra, self.v_ra);
        let (mut dec, mut v_dec) = (self.dec, self.v_dec);
        modify_with_acceleration(&mut ra, &mut v_ra, self.a_ra, dt);
        modify_with_acceleration(&mut dec, &mut v_dec, self.a_dec, dt);
        (wrap_ra(ra), dec)
    }
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one detection of `motion` at `time`, returning its index.
    pub fn add_detection(&mut self, motion: &Motion, time: f64, object: i64) -> usize {
        let (ra, dec) = motion.position_at(time);
        let index = self.detections.len();
        self.detections.push(
            Detection::new(index as i64, time, ra, dec, DET_ERR, DET_ERR).with_object_id(object),
        );
        index
    }

    /// Add a tracklet observed at `times`, returning its detection indices.
    pub fn add_tracklet(&mut self, motion: &Motion, times: &[f64], object: i64) -> Vec<usize> {
        let indices: Vec<usize> = times
            .iter()
            .map(|&t| self.add_detection(motion, t, object))
            .collect();
        self.tracklets.push(Tracklet::new(indices.iter().copied()));
        indices
    }

    /// Observe `motion` with one pair per night (`night`, `night + tracklet_dt`) and
    /// return the track the linker is expected to produce.
    pub fn generate_track(
        &mut self,
        motion: &Motion,
        nights: &[f64],
        tracklet_dt: f64,
        object: i64,
    ) -> Track {
        let indices: Vec<usize> = nights
            .iter()
            .flat_map(|&n| self.add_tracklet(motion, &[n, n + tracklet_dt], object))
            .collect();
        Track::from_detections(indices)
    }

    /// Shift every detection from `first` on by a random offset of at most
    /// `amplitude` degrees on each axis.
    pub fn add_noise(&mut self, rng: &mut impl rand::Rng, first: usize, amplitude: f64) {
        for d in &mut self.detections[first..] {
            d.ra = wrap_ra(d.ra + rng.random_range(-amplitude..amplitude));
            d.dec += rng.random_range(-amplitude..amplitude);
        }
    }
}
