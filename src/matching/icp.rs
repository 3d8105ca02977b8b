//! Point-to-point ICP over 3D clouds.
//!
//! Classic alternation between nearest-neighbour correspondence search and
//! a closed-form rigid alignment (Horn's method via SVD). Correspondences
//! are gated by a distance threshold that anneals by `alfa` once the
//! incremental transform stabilizes, down to a fixed floor.

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;

/// Bucket size large enough to hold the many same-axis-coordinate points
/// common in structured scans (e.g. a flat wall), which would otherwise
/// overflow `kiddo`'s default bucket size of 32 on construction.
const KDTREE_BUCKET_SIZE: usize = 256;
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use super::{IcpOptions, Registration, RegistrationResult};
use crate::core::types::{Point3D, PointCloud3D, Pose3D};
use crate::error::{FrontEndError, Result};

/// Annealing floor for the correspondence distance threshold, meters.
const SMALLEST_THRESHOLD_DIST: f64 = 0.10;

/// Minimum correspondences for a meaningful alignment.
const MIN_CORRESPONDENCES: usize = 3;

/// Convergence bound on the incremental translation, meters.
const TRANSLATION_EPSILON: f64 = 1e-6;

/// Convergence bound on the incremental rotation, radians.
const ROTATION_EPSILON: f64 = 1e-6;

/// Point-to-point ICP registration.
///
/// When a target point count is set, the correspondence decimation factor
/// is overridden to `to.len() / target` so the matched subset lands near
/// the target size regardless of the sensor's native resolution.
#[derive(Debug, Clone)]
pub struct PointToPointIcp {
    options: IcpOptions,
    decimate_to_point_count: usize,
}

impl PointToPointIcp {
    /// Create a matcher with the given options.
    pub fn new(options: IcpOptions) -> Self {
        Self {
            options,
            decimate_to_point_count: 0,
        }
    }

    /// Override decimation to aim for a fixed matched point count.
    pub fn with_target_point_count(mut self, target: usize) -> Self {
        self.decimate_to_point_count = target;
        self
    }

    /// Current options.
    pub fn options(&self) -> &IcpOptions {
        &self.options
    }

    fn effective_decimation(&self, to_len: usize) -> usize {
        if self.decimate_to_point_count > 0 {
            (to_len / self.decimate_to_point_count).max(1)
        } else {
            self.options.corresponding_points_decimation.max(1)
        }
    }

    fn build_kdtree(cloud: &PointCloud3D) -> KdTree<f64, u64, 3, KDTREE_BUCKET_SIZE, u32> {
        let mut tree: KdTree<f64, u64, 3, KDTREE_BUCKET_SIZE, u32> = KdTree::new();
        for (i, point) in cloud.points.iter().enumerate() {
            tree.add(&[point.x, point.y, point.z], i as u64);
        }
        tree
    }

    /// Matched pairs `(moved to-point, from-point)` at the given pose.
    fn find_correspondences(
        from: &PointCloud3D,
        from_tree: &KdTree<f64, u64, 3, KDTREE_BUCKET_SIZE, u32>,
        to: &PointCloud3D,
        pose: &Pose3D,
        decimation: usize,
        max_dist: f64,
    ) -> Vec<(Point3D, Point3D)> {
        let max_dist_sq = max_dist * max_dist;
        let mut pairs = Vec::with_capacity(to.len() / decimation + 1);

        for point in to.points.iter().step_by(decimation) {
            let moved = pose.transform_point(point);
            let nearest = from_tree.nearest_one::<SquaredEuclidean>(&[moved.x, moved.y, moved.z]);
            if nearest.distance <= max_dist_sq {
                pairs.push((moved, from.points[nearest.item as usize]));
            }
        }
        pairs
    }

    /// Closed-form rigid transform aligning the moved points onto their
    /// matches. Returns `None` when the pair set is degenerate.
    fn solve_rigid_alignment(pairs: &[(Point3D, Point3D)]) -> Option<Pose3D> {
        if pairs.len() < MIN_CORRESPONDENCES {
            return None;
        }

        let n = pairs.len() as f64;
        let mut p_centroid = Vector3::zeros();
        let mut q_centroid = Vector3::zeros();
        for (p, q) in pairs {
            p_centroid += Vector3::new(p.x, p.y, p.z);
            q_centroid += Vector3::new(q.x, q.y, q.z);
        }
        p_centroid /= n;
        q_centroid /= n;

        let mut h = Matrix3::zeros();
        for (p, q) in pairs {
            let dp = Vector3::new(p.x, p.y, p.z) - p_centroid;
            let dq = Vector3::new(q.x, q.y, q.z) - q_centroid;
            h += dp * dq.transpose();
        }

        let svd = h.svd(true, true);
        let u = svd.u?;
        let v = svd.v_t?.transpose();

        let mut d = Matrix3::identity();
        if (v * u.transpose()).determinant() < 0.0 {
            d[(2, 2)] = -1.0;
        }
        let r = v * d * u.transpose();

        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        let translation = q_centroid - r * p_centroid;
        Some(Pose3D::new(translation, rotation))
    }

    /// Score in [0, 1] from the matched fraction and residual RMSE.
    fn score(pairs: &[(Point3D, Point3D)], sampled: usize, max_dist: f64) -> f64 {
        if pairs.is_empty() || sampled == 0 {
            return 0.0;
        }
        let mse: f64 =
            pairs.iter().map(|(p, q)| p.distance_squared(q)).sum::<f64>() / pairs.len() as f64;
        let rmse = mse.sqrt();
        let fraction = pairs.len() as f64 / sampled as f64;
        (fraction * (1.0 - rmse / max_dist)).clamp(0.0, 1.0)
    }
}

impl Registration for PointToPointIcp {
    fn register(
        &self,
        from: &PointCloud3D,
        to: &PointCloud3D,
        guess: &Pose3D,
    ) -> Result<RegistrationResult> {
        if from.is_empty() || to.is_empty() {
            return Err(FrontEndError::Registration(
                "cannot register an empty point cloud".into(),
            ));
        }

        let decimation = self.effective_decimation(to.len());
        let sampled = to.len().div_ceil(decimation);
        let from_tree = Self::build_kdtree(from);

        let mut pose = *guess;
        let mut threshold = self.options.threshold_dist.max(SMALLEST_THRESHOLD_DIST);

        for _ in 0..self.options.max_iterations {
            let pairs =
                Self::find_correspondences(from, &from_tree, to, &pose, decimation, threshold);
            let Some(delta) = Self::solve_rigid_alignment(&pairs) else {
                break;
            };
            pose = delta.compose(&pose);

            let stable = delta.translation_norm() < TRANSLATION_EPSILON
                && delta.rotation.angle() < ROTATION_EPSILON;
            if stable {
                if threshold <= SMALLEST_THRESHOLD_DIST {
                    break;
                }
                // Anneal and keep refining with tighter correspondences.
                threshold = (threshold * self.options.alfa).max(SMALLEST_THRESHOLD_DIST);
            }
        }

        // Score against the configured gate, not the annealed one, so the
        // goodness scale stays comparable across runs.
        let final_pairs = Self::find_correspondences(
            from,
            &from_tree,
            to,
            &pose,
            decimation,
            self.options.threshold_dist,
        );
        let goodness = Self::score(&final_pairs, sampled, self.options.threshold_dist);

        Ok(RegistrationResult { pose, goodness })
    }
}
