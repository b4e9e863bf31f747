//! # Tracklet index
//!
//! A k-d tree over tracklets projected into 4-D phase space
//! `(ra, dec, v_ra, v_dec)` at one shared reference time.
//!
//! Each tracklet becomes a [`PhasePoint`]: its linearly extrapolated state at the
//! reference time plus a padded [`PhaseBox`] that contains every state the source
//! could occupy there, given the tracklet errors and the acceleration bounds.
//! Nodes live in an arena (`Vec<Node>`) and reference their children by index.
//! Leaves own a contiguous range of the permuted point array. Every node box is
//! the union of the boxes below it, so pruning a subtree whose box misses the
//! query region can never drop a matching tracklet.
//!
//! Queries are lazy: [`TrackletTree::query`] returns an iterator driven by an
//! explicit stack whose size is bounded by the tree height.
//!
//! ## Example
//!
//! ```rust
//! use tracklink::tracklet_tree::{TrackletTree, TreeParams};
//!
//! let params = TreeParams {
//!     reference_time: 5300.0,
//!     position_err: 0.002,
//!     max_ra_accel: 0.02,
//!     max_dec_accel: 0.02,
//!     leaf_size: 16,
//! };
//! let tree = TrackletTree::build(&[], params);
//! assert!(tree.is_empty());
//! assert!(tree.root_bounds().is_none());
//! ```
pub mod phase_box;

use std::cmp::Ordering;

use crate::constants::{Degree, DegreePerDay2, MJD};
use crate::kinematics::wrap_ra;
use crate::observations::tracklet::TrackletMotion;

pub use phase_box::{PhaseBox, PhasePoint, DEC, PHASE_DIMS, RA, V_DEC, V_RA};

/// Settings fixed at index construction time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Epoch every tracklet is projected to
    pub reference_time: MJD,
    /// Floor added to every tracklet's own position error
    pub position_err: Degree,
    pub max_ra_accel: DegreePerDay2,
    pub max_dec_accel: DegreePerDay2,
    /// Maximum number of points in a leaf
    pub leaf_size: usize,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf { start: usize, end: usize },
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct Node {
    bounds: PhaseBox,
    kind: NodeKind,
}

/// Immutable spatial index over tracklet phase points.
#[derive(Debug, Clone)]
pub struct TrackletTree {
    params: TreeParams,
    points: Vec<PhasePoint>,
    nodes: Vec<Node>,
    root: Option<usize>,
    depth: usize,
}

impl TrackletTree {
    /// Build the index.
    ///
    /// Arguments
    /// -----------------
    /// * `motions` – kinematic summaries of the usable tracklets.
    /// * `params` – reference time, error floor, acceleration bounds and leaf size.
    ///
    /// Return
    /// ----------
    /// * A balanced tree: each internal node splits its points at the median of the
    ///   dimension with the greatest spread of point centers. Ties are broken by
    ///   tracklet index, so the layout only depends on the input.
    pub fn build(motions: &[TrackletMotion], params: TreeParams) -> Self {
        let mut points: Vec<PhasePoint> = motions
            .iter()
            .map(|m| project_motion(m, &params))
            .collect();
        let mut nodes = Vec::with_capacity(2 * points.len() / params.leaf_size.max(1) + 1);

        let (root, depth) = if points.is_empty() {
            (None, 0)
        } else {
            let (root, depth) = build_node(&mut points, 0, params.leaf_size.max(1), &mut nodes);
            (Some(root), depth)
        };

        TrackletTree {
            params,
            points,
            nodes,
            root,
            depth,
        }
    }

    /// Project one tracklet with this index's settings.
    pub fn project(&self, motion: &TrackletMotion) -> PhasePoint {
        project_motion(motion, &self.params)
    }

    /// Lazily visit every point whose box intersects `region` and that `accept` keeps.
    ///
    /// Subtrees whose bounding box misses `region` are skipped, leaves are scanned
    /// exhaustively. RA overlap is tested with ±360° shifts.
    pub fn query<F>(&self, region: PhaseBox, accept: F) -> TreeQuery<'_, F>
    where
        F: FnMut(&PhasePoint) -> bool,
    {
        let mut stack = Vec::with_capacity(self.depth + 1);
        stack.extend(self.root);
        TreeQuery {
            tree: self,
            region,
            accept,
            stack,
            leaf: self.points[..0].iter(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn reference_time(&self) -> MJD {
        self.params.reference_time
    }

    #[inline]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Number of node levels (0 for an empty index, 1 for a single leaf).
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Box covering every point, `None` for an empty index.
    pub fn root_bounds(&self) -> Option<PhaseBox> {
        self.root.map(|r| self.nodes[r].bounds)
    }

    /// Points in index order (permuted relative to the input).
    pub fn points(&self) -> &[PhasePoint] {
        &self.points
    }
}

/// Project a tracklet to the reference time.
///
/// With `Δ = t_ref − start`, `σp` the padded position error, `σv` the velocity
/// error and `a` the acceleration bound of the axis:
///
/// ```text
/// center   = (ra + v_ra·Δ, dec + v_dec·Δ, v_ra, v_dec)
/// position ± σp + σv·|Δ| + ½·a·Δ²
/// velocity ± σv + a·|Δ|
/// ```
fn project_motion(motion: &TrackletMotion, params: &TreeParams) -> PhasePoint {
    let dt = params.reference_time - motion.start;
    let accel = [params.max_ra_accel, params.max_dec_accel];
    let sigma_p = motion.position_err + params.position_err;

    let mut center = [0.0; PHASE_DIMS];
    let mut half = [0.0; PHASE_DIMS];
    for axis in 0..2 {
        let sigma_v = motion.velocity_err[axis];
        center[axis] = motion.position[axis] + motion.velocity[axis] * dt;
        center[axis + 2] = motion.velocity[axis];
        half[axis] = sigma_p + sigma_v * dt.abs() + 0.5 * accel[axis] * dt * dt;
        half[axis + 2] = sigma_v + accel[axis] * dt.abs();
    }
    center[RA] = wrap_ra(center[RA]);

    PhasePoint {
        tracklet: motion.tracklet,
        start: motion.start,
        center,
        bounds: PhaseBox::around(center, half),
    }
}

fn union_of(points: &[PhasePoint]) -> PhaseBox {
    let first = points[0].bounds;
    points[1..].iter().fold(first, |acc, p| acc.union(&p.bounds))
}

fn widest_dimension(points: &[PhasePoint]) -> usize {
    let mut lo = [f64::INFINITY; PHASE_DIMS];
    let mut hi = [f64::NEG_INFINITY; PHASE_DIMS];
    for p in points {
        for d in 0..PHASE_DIMS {
            lo[d] = lo[d].min(p.center[d]);
            hi[d] = hi[d].max(p.center[d]);
        }
    }
    (0..PHASE_DIMS)
        .max_by(|&a, &b| (hi[a] - lo[a]).total_cmp(&(hi[b] - lo[b])).then(b.cmp(&a)))
        .unwrap_or(RA)
}

/// Build the subtree over `points` (which start at `offset` in the full array).
/// Children are pushed before their parent. Returns `(node, depth)`.
fn build_node(
    points: &mut [PhasePoint],
    offset: usize,
    leaf_size: usize,
    nodes: &mut Vec<Node>,
) -> (usize, usize) {
    if points.len() <= leaf_size {
        nodes.push(Node {
            bounds: union_of(points),
            kind: NodeKind::Leaf {
                start: offset,
                end: offset + points.len(),
            },
        });
        return (nodes.len() - 1, 1);
    }

    let dim = widest_dimension(points);
    let mid = points.len() / 2;
    points.select_nth_unstable_by(mid, |a, b| compare_on(dim, a, b));

    let (left_points, right_points) = points.split_at_mut(mid);
    let (left, left_depth) = build_node(left_points, offset, leaf_size, nodes);
    let (right, right_depth) = build_node(right_points, offset + mid, leaf_size, nodes);

    let bounds = nodes[left].bounds.union(&nodes[right].bounds);
    nodes.push(Node {
        bounds,
        kind: NodeKind::Internal { left, right },
    });
    (nodes.len() - 1, 1 + left_depth.max(right_depth))
}

fn compare_on(dim: usize, a: &PhasePoint, b: &PhasePoint) -> Ordering {
    a.center[dim]
        .total_cmp(&b.center[dim])
        .then(a.tracklet.cmp(&b.tracklet))
}

/// Iterator returned by [`TrackletTree::query`].
pub struct TreeQuery<'a, F> {
    tree: &'a TrackletTree,
    region: PhaseBox,
    accept: F,
    stack: Vec<usize>,
    leaf: std::slice::Iter<'a, PhasePoint>,
}

impl<'a, F> Iterator for TreeQuery<'a, F>
where
    F: FnMut(&PhasePoint) -> bool,
{
    type Item = &'a PhasePoint;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for point in self.leaf.by_ref() {
                if point.bounds.intersects(&self.region) && (self.accept)(point) {
                    return Some(point);
                }
            }

            let node = &self.tree.nodes[self.stack.pop()?];
            if !node.bounds.intersects(&self.region) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    self.leaf = self.tree.points[start..end].iter();
                }
                NodeKind::Internal { left, right } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
    }
}
