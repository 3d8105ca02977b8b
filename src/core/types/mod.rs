//! Core data types shared across the front-end.

mod cloud;
mod ids;
mod observation;
mod pose;

pub use cloud::{Point3D, PointCloud3D};
pub use ids::{FactorId, KeyframeId, INVALID_FACTOR_ID, INVALID_KEYFRAME_ID};
pub use observation::Observation;
pub use pose::{Pose3D, Twist3D};
