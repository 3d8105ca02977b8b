//! External collaborator interfaces: SLAM back-end and world model.
//!
//! The back-end is the identity authority; every keyframe and factor id
//! comes from it. Calls block the submitting worker until the back-end has
//! answered, which serializes identity allocation without ever blocking
//! the observation ingress path.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::types::{FactorId, KeyframeId, Observation, Pose3D};

/// Keyframe proposal sent to the back-end.
#[derive(Debug, Clone)]
pub struct AddKeyFrameRequest {
    /// Capture timestamp of the anchoring observation, microseconds.
    pub timestamp_us: u64,
    /// The observation the keyframe is built from.
    pub observation: Arc<Observation>,
}

/// Back-end answer to a keyframe proposal.
#[derive(Debug, Clone)]
pub struct AddKeyFrameResponse {
    /// Whether the proposal was accepted.
    pub success: bool,
    /// The freshly minted keyframe id, when accepted.
    pub new_kf_id: Option<KeyframeId>,
}

/// Relative SE(3) constraint between two keyframes.
#[derive(Debug, Clone)]
pub struct RelativePoseFactor {
    /// Reference keyframe.
    pub from: KeyframeId,
    /// Constrained keyframe.
    pub to: KeyframeId,
    /// Pose of `to` with respect to `from`.
    pub rel_pose: Pose3D,
}

/// Back-end answer to a factor submission.
#[derive(Debug, Clone)]
pub struct AddFactorResponse {
    /// Whether the factor was accepted.
    pub success: bool,
    /// The factor id, when accepted.
    pub new_factor_id: Option<FactorId>,
}

/// The SLAM back-end (factor-graph solver).
pub trait SlamBackend: Send + Sync {
    /// Propose a new keyframe. Blocks until the id is allocated.
    fn add_key_frame(&self, request: AddKeyFrameRequest) -> AddKeyFrameResponse;

    /// Submit a relative pose factor. Blocks until accepted or rejected.
    fn add_factor(&self, factor: RelativePoseFactor) -> AddFactorResponse;
}

/// The shared world model (map store).
pub trait WorldModel: Send + Sync {
    /// Keyframes connected to `id` by an existing factor.
    ///
    /// The call itself is the coarse critical section: implementations
    /// take their entity lock for the duration of the query and release
    /// it before returning.
    fn entity_neighbors(&self, id: KeyframeId) -> HashSet<KeyframeId>;
}
