//! # Tracks and track sets
//!
//! A [`Track`] is the output unit of the linker: the detections (and the
//! tracklets they came from) attributed to one moving source. Two tracks are the
//! same track when they hold the same detections, regardless of how they were
//! assembled, so equality, ordering and hashing only look at the sorted
//! detection indices.
//!
//! A [`TrackSet`] is an ordered set of tracks. Inserting a structural duplicate is
//! a no-op, which is what makes the search order irrelevant to the output.
use std::cmp::Ordering;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, DetectionIndex, TrackletIndex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    detection_indices: Vec<DetectionIndex>,
    tracklet_indices: Vec<TrackletIndex>,
    /// RMS of the fit that accepted this track (deg)
    pub rms: Degree,
}

impl Track {
    /// Build a track; both index lists are sorted and de-duplicated.
    pub fn new<D, T>(detection_indices: D, tracklet_indices: T, rms: Degree) -> Self
    where
        D: IntoIterator<Item = DetectionIndex>,
        T: IntoIterator<Item = TrackletIndex>,
    {
        Track {
            detection_indices: detection_indices.into_iter().sorted_unstable().dedup().collect(),
            tracklet_indices: tracklet_indices.into_iter().sorted_unstable().dedup().collect(),
            rms,
        }
    }

    /// Track with no tracklet provenance, e.g. for building expected results.
    pub fn from_detections<D: IntoIterator<Item = DetectionIndex>>(detection_indices: D) -> Self {
        Self::new(detection_indices, std::iter::empty(), 0.0)
    }

    #[inline]
    pub fn detection_indices(&self) -> &[DetectionIndex] {
        &self.detection_indices
    }

    #[inline]
    pub fn tracklet_indices(&self) -> &[TrackletIndex] {
        &self.tracklet_indices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detection_indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detection_indices.is_empty()
    }

    /// True if every detection of `self` is in `other` and `other` has more.
    pub fn is_strict_subset_of(&self, other: &Track) -> bool {
        if self.len() >= other.len() {
            return false;
        }
        // both sides are sorted
        let mut theirs = other.detection_indices.iter().peekable();
        self.detection_indices.iter().all(|d| {
            while theirs.next_if(|o| *o < d).is_some() {}
            theirs.next_if_eq(&d).is_some()
        })
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.detection_indices == other.detection_indices
    }
}

impl Eq for Track {}

impl PartialOrd for Track {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Track {
    fn cmp(&self, other: &Self) -> Ordering {
        self.detection_indices.cmp(&other.detection_indices)
    }
}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.detection_indices.hash(state);
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Track([{}], rms={:.2e})",
            self.detection_indices.iter().join(", "),
            self.rms
        )
    }
}

/// Deduplicating, ordered collection of [`Track`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSet {
    tracks: BTreeSet<Track>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track. Returns `false` when an equal track is already present
    /// (the stored track is kept).
    pub fn insert(&mut self, track: Track) -> bool {
        self.tracks.insert(track)
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.tracks.contains(track)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Track> {
        self.tracks.iter()
    }

    /// True if every track of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &TrackSet) -> bool {
        self.tracks.is_subset(&other.tracks)
    }

    /// Drop every track whose detections are a strict subset of another member's.
    ///
    /// Return
    /// ----------
    /// * the number of tracks removed.
    pub fn remove_subsets(&mut self) -> usize {
        let by_size: Vec<&Track> = self
            .tracks
            .iter()
            .sorted_by_key(|t| std::cmp::Reverse(t.len()))
            .collect();

        let redundant: Vec<Track> = by_size
            .iter()
            .enumerate()
            .filter(|(i, t)| {
                by_size[..*i]
                    .iter()
                    .any(|bigger| t.is_strict_subset_of(bigger))
            })
            .map(|(_, t)| (*t).clone())
            .collect();

        for t in &redundant {
            self.tracks.remove(t);
        }
        redundant.len()
    }
}

impl FromIterator<Track> for TrackSet {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        TrackSet {
            tracks: iter.into_iter().collect(),
        }
    }
}

impl Extend<Track> for TrackSet {
    fn extend<I: IntoIterator<Item = Track>>(&mut self, iter: I) {
        self.tracks.extend(iter);
    }
}

impl IntoIterator for TrackSet {
    type Item = Track;
    type IntoIter = btree_set::IntoIter<Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.into_iter()
    }
}

impl<'a> IntoIterator for &'a TrackSet {
    type Item = &'a Track;
    type IntoIter = btree_set::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

impl fmt::Display for TrackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "TrackSet ({} tracks)", self.len())?;
            for t in &self.tracks {
                writeln!(f, "  {t}")?;
            }
            Ok(())
        } else {
            write!(f, "TrackSet({} tracks)", self.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equality_ignores_provenance() {
        let a = Track::new([5, 1, 3], [0, 1], 1e-4);
        let b = Track::new([1, 3, 5, 3], [2], 0.0);
        assert_eq!(a, b);
        assert_eq!(a.detection_indices(), &[1, 3, 5]);
        assert_eq!(b.tracklet_indices(), &[2]);

        let mut set = TrackSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert_eq!(set.len(), 1);
        // first insertion wins
        assert_eq!(set.iter().next().unwrap().tracklet_indices(), &[0, 1]);
    }

    #[test]
    fn set_relations() {
        let small: TrackSet = [Track::from_detections([0, 1]), Track::from_detections([2, 3])]
            .into_iter()
            .collect();
        let mut big = small.clone();
        big.extend([Track::from_detections([4, 5])]);

        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(small.is_subset_of(&small));
        assert_ne!(small, big);
        assert!(big.contains(&Track::from_detections([5, 4])));
        assert!(TrackSet::new().is_empty());
    }

    #[test]
    fn strict_subsets() {
        let full = Track::from_detections([1, 2, 3, 4]);
        assert!(Track::from_detections([1, 3]).is_strict_subset_of(&full));
        assert!(Track::from_detections([4]).is_strict_subset_of(&full));
        assert!(!Track::from_detections([1, 5]).is_strict_subset_of(&full));
        assert!(!full.is_strict_subset_of(&full));
    }

    #[test]
    fn removes_contained_tracks() {
        let mut set: TrackSet = [
            Track::from_detections([0, 1, 2, 3, 4, 5]),
            Track::from_detections([0, 1, 2, 3]),
            Track::from_detections([2, 3, 4, 5, 6]),
            Track::from_detections([4, 5, 6]),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.remove_subsets(), 2);
        let expected: TrackSet = [
            Track::from_detections([0, 1, 2, 3, 4, 5]),
            Track::from_detections([2, 3, 4, 5, 6]),
        ]
        .into_iter()
        .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn display() {
        let set: TrackSet = [Track::new([2, 1], [0], 1e-4)].into_iter().collect();
        assert_eq!(format!("{set}"), "TrackSet(1 tracks)");
        assert!(format!("{set:#}").contains("Track([1, 2], rms=1.00e-4)"));
    }

    proptest! {
        #[test]
        fn prop_insert_is_idempotent(tracks in prop::collection::vec(
            prop::collection::vec(0usize..20, 1..6), 0..20)
        ) {
            let set: TrackSet = tracks.iter().cloned().map(Track::from_detections).collect();
            let mut again = set.clone();
            for t in tracks.into_iter().map(Track::from_detections) {
                prop_assert!(!again.insert(t));
            }
            prop_assert_eq!(&again, &set);
            prop_assert!(set.is_subset_of(&again) && again.is_subset_of(&set));
        }
    }
}
