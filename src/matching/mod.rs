//! Point-cloud registration.
//!
//! The front-end treats registration as a black box behind the
//! [`Registration`] trait: align cloud `to` against cloud `from` starting
//! from an initial guess, and report the relative pose together with a
//! quality score. [`PointToPointIcp`] is the shipped implementation.

mod icp;

pub use icp::PointToPointIcp;

use serde::Deserialize;

use crate::core::types::{PointCloud3D, Pose3D};
use crate::error::Result;

/// Outcome of a registration attempt.
///
/// The pose is the mean of the estimated pose distribution; `goodness` is
/// a quality scalar in [0, 1], monotone in registration quality.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// Pose of `to` with respect to `from`.
    pub pose: Pose3D,
    /// Registration quality in [0, 1]; higher is better.
    pub goodness: f64,
}

/// Black-box registration contract.
pub trait Registration: Send + Sync {
    /// Align `to` against `from` starting at `guess`.
    ///
    /// Implementations must be pure with respect to front-end state: the
    /// same inputs always produce the same output.
    fn register(
        &self,
        from: &PointCloud3D,
        to: &PointCloud3D,
        guess: &Pose3D,
    ) -> Result<RegistrationResult>;
}

/// Tuning knobs for the ICP kernel.
#[derive(Clone, Debug, Deserialize)]
pub struct IcpOptions {
    /// Iteration cap across all annealing stages.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Correspondence distance threshold in meters.
    #[serde(default = "default_threshold_dist")]
    pub threshold_dist: f64,

    /// Correspondence angle threshold in radians.
    ///
    /// Retained for kernels that gate correspondences by bearing; the
    /// shipped point-to-point kernel does not consume it.
    #[serde(default = "default_threshold_ang")]
    pub threshold_ang: f64,

    /// Threshold annealing ratio applied once the solution stabilizes.
    #[serde(default = "default_alfa")]
    pub alfa: f64,

    /// Skip covariance computation in kernels that provide one.
    #[serde(default)]
    pub skip_cov_calculation: bool,

    /// Use every n-th point of the `to` cloud when matching.
    #[serde(default = "default_decimation")]
    pub corresponding_points_decimation: usize,
}

fn default_max_iterations() -> u32 {
    50
}
fn default_threshold_dist() -> f64 {
    1.25
}
fn default_threshold_ang() -> f64 {
    1.0_f64.to_radians()
}
fn default_alfa() -> f64 {
    0.01
}
fn default_decimation() -> usize {
    5
}

impl Default for IcpOptions {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            threshold_dist: default_threshold_dist(),
            threshold_ang: default_threshold_ang(),
            alfa: default_alfa(),
            skip_cov_calculation: false,
            corresponding_points_decimation: default_decimation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_options() {
        let options = IcpOptions::default();
        assert_eq!(options.max_iterations, 50);
        assert_relative_eq!(options.threshold_dist, 1.25);
        assert_relative_eq!(options.threshold_ang, 1.0_f64.to_radians());
        assert_relative_eq!(options.alfa, 0.01);
        assert!(!options.skip_cov_calculation);
        assert_eq!(options.corresponding_points_decimation, 5);
    }
}
