//! Raw sensor observations.

use super::{Point3D, PointCloud3D};

/// A single sample from a ranging sensor.
///
/// Immutable once received. The sample carries enough data to produce a
/// point cloud; an empty sample is one that cannot be converted (for
/// instance a dropout frame from the driver).
#[derive(Debug, Clone)]
pub struct Observation {
    /// Monotonic capture timestamp in microseconds.
    pub timestamp_us: u64,
    /// Label of the producing sensor.
    pub sensor_label: String,
    /// Raw 3D returns in the sensor frame.
    pub points: Vec<Point3D>,
}

impl Observation {
    /// Create a new observation.
    pub fn new(timestamp_us: u64, sensor_label: impl Into<String>, points: Vec<Point3D>) -> Self {
        Self {
            timestamp_us,
            sensor_label: sensor_label.into(),
            points,
        }
    }

    /// Convert the sample into a point cloud.
    ///
    /// Returns `None` when the sample carries no points.
    pub fn point_cloud(&self) -> Option<PointCloud3D> {
        if self.points.is_empty() {
            return None;
        }
        Some(PointCloud3D::from_points(self.points.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_cloud_conversion() {
        let obs = Observation::new(1_000, "lidar", vec![Point3D::new(1.0, 0.0, 0.0)]);
        let cloud = obs.point_cloud().unwrap();
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_empty_observation_has_no_cloud() {
        let obs = Observation::new(1_000, "lidar", Vec::new());
        assert!(obs.point_cloud().is_none());
    }
}
