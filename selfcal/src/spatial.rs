//! Spatial index over catalog star positions.
//!
//! Stars are indexed as unit vectors in a bucketed 3-D k-d tree. Working in
//! Cartesian space sidesteps the RA wraparound and the pole singularity that
//! plague angular comparisons. The catch is that the tree measures Euclidean
//! (chord) distance, so field-of-view radii must first go through
//! [`chord_radius`] before they can be used as a query radius.

use std::f64::consts::TAU;
use std::ops::Range;

use nalgebra::Vector3;

use crate::coords::{to_unit_vector, to_unit_vectors};
use crate::error::{Result, SelfcalError};

/// Default maximum number of points held in a single leaf bucket.
pub const DEFAULT_LEAF_SIZE: usize = 100;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        range: Range<usize>,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// Immutable k-d tree over catalog unit vectors.
///
/// Built once per run and shared read-only by every visit.
#[derive(Debug, Clone)]
pub struct StarIndex {
    /// Unit vectors in catalog order
    points: Vec<Vector3<f64>>,
    /// Catalog indices permuted so each leaf owns a contiguous range
    order: Vec<usize>,
    nodes: Vec<Node>,
    leaf_size: usize,
}

impl StarIndex {
    /// Build the index from longitude/latitude sequences in radians.
    ///
    /// # Errors
    /// `InvalidInput` when the sequences are empty or differ in length, when
    /// `leaf_size` is zero, or when any angle is non-finite or exceeds 2π in
    /// magnitude (the usual symptom of degrees being passed as radians).
    pub fn build(lon_rad: &[f64], lat_rad: &[f64], leaf_size: usize) -> Result<Self> {
        if lon_rad.is_empty() || lat_rad.is_empty() {
            return Err(SelfcalError::InvalidInput(
                "star positions must contain at least one entry".to_string(),
            ));
        }
        if lon_rad.len() != lat_rad.len() {
            return Err(SelfcalError::InvalidInput(format!(
                "longitude and latitude lengths differ ({} vs {})",
                lon_rad.len(),
                lat_rad.len()
            )));
        }
        if leaf_size == 0 {
            return Err(SelfcalError::InvalidInput(
                "leaf size must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = lon_rad
            .iter()
            .chain(lat_rad)
            .find(|angle| !angle.is_finite() || angle.abs() > TAU)
        {
            return Err(SelfcalError::InvalidInput(format!(
                "expecting angles in radians, found {bad}"
            )));
        }

        let points = to_unit_vectors(lon_rad, lat_rad);
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::new();

        Self::build_recursive(&points, &mut order, 0, leaf_size, &mut nodes);

        Ok(Self {
            points,
            order,
            nodes,
            leaf_size,
        })
    }

    /// Recursively partition `order[offset..offset + len]`, returning the node index.
    fn build_recursive(
        points: &[Vector3<f64>],
        order: &mut [usize],
        offset: usize,
        leaf_size: usize,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let len = order.len();
        let node_idx = nodes.len();
        let leaf = Node::Leaf {
            range: offset..offset + len,
        };

        if len <= leaf_size {
            nodes.push(leaf);
            return node_idx;
        }

        // Split along the axis of greatest spread
        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        for &i in order.iter() {
            lo = lo.inf(&points[i]);
            hi = hi.sup(&points[i]);
        }
        let spread = hi - lo;
        let axis = spread.imax();
        if spread[axis] <= 0.0 {
            // All points coincide; nothing to split
            nodes.push(leaf);
            return node_idx;
        }

        let median = len / 2;
        order.select_nth_unstable_by(median, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));
        let value = points[order[median]][axis];

        // Reserve the slot so children land after their parent
        nodes.push(leaf);

        let (left_order, right_order) = order.split_at_mut(median);
        let left = Self::build_recursive(points, left_order, offset, leaf_size, nodes);
        let right = Self::build_recursive(points, right_order, offset + median, leaf_size, nodes);

        nodes[node_idx] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        node_idx
    }

    /// Return the catalog indices of every point within `chord_radius` of `direction`.
    ///
    /// The comparison is inclusive and in Euclidean distance. Results come back in
    /// tree order, not catalog order. An empty vector means the visit sees nothing.
    pub fn query_candidates(&self, direction: &Vector3<f64>, chord_radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        if chord_radius < 0.0 || !chord_radius.is_finite() {
            return found;
        }
        let radius_sq = chord_radius * chord_radius;
        self.query_recursive(0, direction, chord_radius, radius_sq, &mut found);
        found
    }

    fn query_recursive(
        &self,
        node_idx: usize,
        query: &Vector3<f64>,
        radius: f64,
        radius_sq: f64,
        found: &mut Vec<usize>,
    ) {
        match &self.nodes[node_idx] {
            Node::Leaf { range } => {
                for &catalog_idx in &self.order[range.clone()] {
                    if (self.points[catalog_idx] - query).norm_squared() <= radius_sq {
                        found.push(catalog_idx);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let coord = query[*axis];
                if coord - radius <= *value {
                    self.query_recursive(*left, query, radius, radius_sq, found);
                }
                if coord + radius >= *value {
                    self.query_recursive(*right, query, radius, radius_sq, found);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    /// Unit vector of the star at catalog index `idx`.
    pub fn point(&self, idx: usize) -> &Vector3<f64> {
        &self.points[idx]
    }
}

/// Convert an angular radius (radians) into the equivalent chord length on the unit sphere.
///
/// This is the straight-line distance between the equatorial direction (1, 0, 0)
/// and a point displaced from it by `angular_radius_rad` along the equator, which
/// equals `2 sin(θ/2)`.
pub fn chord_radius(angular_radius_rad: f64) -> f64 {
    let pole = Vector3::new(1.0, 0.0, 0.0);
    (to_unit_vector(angular_radius_rad, 0.0) - pole).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_sky(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let lon = (0..n).map(|_| rng.random_range(0.0..TAU)).collect();
        // Uniform on the sphere
        let lat = (0..n)
            .map(|_| rng.random_range(-1.0f64..1.0).asin())
            .collect();
        (lon, lat)
    }

    fn brute_force(index: &StarIndex, direction: &Vector3<f64>, radius: f64) -> Vec<usize> {
        (0..index.len())
            .filter(|&i| (index.point(i) - direction).norm() <= radius)
            .collect()
    }

    #[test]
    fn test_build_rejects_empty() {
        let result = StarIndex::build(&[], &[], DEFAULT_LEAF_SIZE);
        assert!(matches!(result, Err(SelfcalError::InvalidInput(_))));
    }

    #[test]
    fn test_build_rejects_degrees() {
        let result = StarIndex::build(&[10.0, 200.0], &[0.0, 45.0], DEFAULT_LEAF_SIZE);
        assert!(matches!(result, Err(SelfcalError::InvalidInput(_))));
    }

    #[test]
    fn test_build_rejects_nan_and_mismatched_lengths() {
        assert!(StarIndex::build(&[f64::NAN], &[0.0], 10).is_err());
        assert!(StarIndex::build(&[0.0, 1.0], &[0.0], 10).is_err());
        assert!(StarIndex::build(&[0.0], &[0.0], 0).is_err());
    }

    #[test]
    fn test_chord_radius_matches_closed_form() {
        for angle in [0.0, 1e-4, 0.0314, 0.5, 1.0, std::f64::consts::PI] {
            assert_relative_eq!(chord_radius(angle), 2.0 * (angle / 2.0).sin(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_query_matches_brute_force() {
        let (lon, lat) = random_sky(5000, 7);
        let index = StarIndex::build(&lon, &lat, 16).unwrap();
        let radius = chord_radius(5.0_f64.to_radians());

        let (qlon, qlat) = random_sky(25, 99);
        for (&ql, &qb) in qlon.iter().zip(&qlat) {
            let direction = to_unit_vector(ql, qb);
            let mut found = index.query_candidates(&direction, radius);
            found.sort_unstable();
            assert_eq!(found, brute_force(&index, &direction, radius));
        }
    }

    #[test]
    fn test_query_near_pole_and_wraparound() {
        // Stars straddling RA = 0 and clustered at the north pole
        let lon = vec![
            0.001,
            TAU - 0.001,
            std::f64::consts::PI,
            0.0,
            2.0,
            4.0,
        ];
        let lat = vec![0.0, 0.0, 0.0, 1.5707, 1.5706, 1.5705];
        let index = StarIndex::build(&lon, &lat, 1).unwrap();
        let radius = chord_radius(0.01);

        let mut at_origin = index.query_candidates(&to_unit_vector(0.0, 0.0), radius);
        at_origin.sort_unstable();
        assert_eq!(at_origin, vec![0, 1]);

        let mut at_pole = index
            .query_candidates(&to_unit_vector(0.0, std::f64::consts::FRAC_PI_2), radius);
        at_pole.sort_unstable();
        assert_eq!(at_pole, vec![3, 4, 5]);
    }

    #[test]
    fn test_query_selection_correctness() {
        let (lon, lat) = random_sky(2000, 3);
        let index = StarIndex::build(&lon, &lat, DEFAULT_LEAF_SIZE).unwrap();
        let radius = chord_radius(10.0_f64.to_radians());
        let direction = to_unit_vector(1.0, 0.3);

        let found = index.query_candidates(&direction, radius);
        assert!(!found.is_empty());
        for idx in found {
            assert!((index.point(idx) - direction).norm() <= radius);
        }
    }

    #[test]
    fn test_query_far_away_is_empty() {
        let index = StarIndex::build(&[0.0, 0.01], &[0.0, 0.0], DEFAULT_LEAF_SIZE).unwrap();
        let direction = to_unit_vector(std::f64::consts::PI, 0.0);
        assert!(index
            .query_candidates(&direction, chord_radius(0.05))
            .is_empty());
    }

    #[test]
    fn test_duplicate_points_do_not_split_forever() {
        let lon = vec![0.5; 500];
        let lat = vec![0.25; 500];
        let index = StarIndex::build(&lon, &lat, 4).unwrap();
        let found = index.query_candidates(&to_unit_vector(0.5, 0.25), 1e-9);
        assert_eq!(found.len(), 500);
    }
}
