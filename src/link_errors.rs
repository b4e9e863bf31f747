use thiserror::Error;

use crate::constants::{DetectionIndex, TrackletIndex};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Tracklet {0} has no detections")]
    EmptyTracklet(TrackletIndex),

    #[error("Tracklet {tracklet} references detection {detection}, but only {len} detections were given")]
    DetectionIndexOutOfRange {
        tracklet: TrackletIndex,
        detection: DetectionIndex,
        len: usize,
    },

    #[error("Tracklet {0} is degenerate: all of its detections share one timestamp")]
    DegenerateTracklet(TrackletIndex),

    #[error("Invalid linking parameter: {0}")]
    InvalidLinkParameter(String),

    #[error("Least-squares fit failed: {0}")]
    SingularFit(String),
}

impl PartialEq for LinkError {
    fn eq(&self, other: &Self) -> bool {
        use LinkError::*;
        match (self, other) {
            (EmptyTracklet(a), EmptyTracklet(b)) => a == b,
            (
                DetectionIndexOutOfRange {
                    tracklet: ta,
                    detection: da,
                    len: la,
                },
                DetectionIndexOutOfRange {
                    tracklet: tb,
                    detection: db,
                    len: lb,
                },
            ) => ta == tb && da == db && la == lb,
            (DegenerateTracklet(a), DegenerateTracklet(b)) => a == b,
            (InvalidLinkParameter(a), InvalidLinkParameter(b)) => a == b,
            (SingularFit(a), SingularFit(b)) => a == b,
            _ => false,
        }
    }
}
