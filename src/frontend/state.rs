//! Mutable front-end state.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::types::{
    KeyframeId, Observation, PointCloud3D, Pose3D, Twist3D, INVALID_KEYFRAME_ID,
};

/// Aggregate state of the odometry pipeline.
///
/// Mutated only on the odometry worker (single-producer discipline); the
/// local pose graph lives behind its own lock so probe workers can append
/// edges without touching this aggregate.
#[derive(Debug, Default)]
pub struct FrontEndState {
    /// Most recently processed observation.
    pub last_obs: Option<Arc<Observation>>,
    /// Timestamp of the most recently processed observation, microseconds.
    pub last_obs_tim: Option<u64>,
    /// Point cloud of the most recently processed observation.
    pub last_points: Option<Arc<PointCloud3D>>,
    /// Current velocity estimate.
    pub last_twist: Twist3D,
    /// SE(3) displacement accumulated since the last keyframe.
    pub accum_since_last_kf: Pose3D,
    /// The latest promoted keyframe, or the invalid sentinel before the
    /// first promotion.
    pub last_kf: KeyframeId,
    /// Unordered keyframe pairs already submitted to the probe pool.
    pub checked_pairs: HashSet<(KeyframeId, KeyframeId)>,
}

impl FrontEndState {
    /// Bootstrap state: no previous scan, zero twist, identity accumulator.
    pub fn new() -> Self {
        Self {
            last_kf: INVALID_KEYFRAME_ID,
            ..Self::default()
        }
    }
}

/// Read-only snapshot of the front-end for observers and tests.
#[derive(Debug, Clone)]
pub struct FrontEndStatus {
    /// The latest promoted keyframe, or the invalid sentinel.
    pub last_kf: KeyframeId,
    /// Current velocity estimate.
    pub twist: Twist3D,
    /// Translation accumulated since the last keyframe, meters.
    pub accum_distance: f64,
    /// Timestamp of the most recently processed observation.
    pub last_obs_timestamp_us: Option<u64>,
    /// Keyframes currently held in the local graph, sorted.
    pub graph_nodes: Vec<KeyframeId>,
    /// Edge count of the local graph.
    pub graph_edges: usize,
}
