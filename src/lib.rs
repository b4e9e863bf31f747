//! Bounded-acceleration linking of astrometric tracklets into multi-night tracks.
//!
//! See [`linking`] for the search itself and [`link_params`] for its configuration.
pub mod constants;
pub mod kinematics;
pub mod link_errors;
pub mod link_params;
pub mod linkable;
pub mod linking;
pub mod observations;
mod progress;
pub mod track_fit;
pub mod tracklet_tree;
pub mod tracks;

pub use link_errors::LinkError;
pub use link_params::{FitAcceptance, LinkParams, LinkParamsBuilder};
pub use linkable::linkable_objects;
pub use linking::{link_tracklets, link_tracklets_with_stats, LinkStats, TrackLinker};
pub use observations::tracklet::{Tracklet, TrackletMotion};
pub use observations::Detection;
pub use tracks::{Track, TrackSet};
