//! Gati Odometry - LiDAR odometry and local pose-graph front-end.
//!
//! Consumes a stream of 3D point-cloud observations from a single ranging
//! sensor and produces keyframes, relative SE(3) odometry constraints and
//! opportunistic non-adjacent constraints for an external SLAM back-end.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   frontend/                         │  ← Orchestration
//! │   (ingress filter, odometry stage, promoter,        │
//! │    nearby-keyframe prober, worker pools)            │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │              graph/      matching/                  │  ← Algorithms
//! │   (local pose graph)   (ICP registration)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │        (poses, twists, clouds, observations)        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The back-end solver and the shared world model are external
//! collaborators reached through the traits in [`backend`].

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Algorithms (depend on core)
// ============================================================================
pub mod graph;
pub mod matching;

// ============================================================================
// Layer 3: Infrastructure
// ============================================================================
pub mod backend;
pub mod config;
pub mod error;
pub mod utils;
pub mod workers;

// ============================================================================
// Layer 4: Front-end orchestration (depends on all layers)
// ============================================================================
pub mod frontend;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use self::core::types::{FactorId, KeyframeId, INVALID_FACTOR_ID, INVALID_KEYFRAME_ID};
pub use self::core::types::{Observation, Point3D, PointCloud3D, Pose3D, Twist3D};

// Algorithms
pub use graph::{GraphEdge, LocalPoseGraph};
pub use matching::{IcpOptions, PointToPointIcp, Registration, RegistrationResult};

// Infrastructure
pub use backend::{
    AddFactorResponse, AddKeyFrameRequest, AddKeyFrameResponse, RelativePoseFactor, SlamBackend,
    WorldModel,
};
pub use config::FrontEndConfig;
pub use error::{FrontEndError, Result};
pub use workers::WorkerPool;

// Front-end
pub use frontend::{FrontEndStatus, LidarFrontEnd};
