//! Configuration loading for the front-end.
//!
//! The configuration lives under a `[params]` table so a front-end block
//! can be embedded in a larger deployment document:
//!
//! ```toml
//! [params]
//! raw_sensor_label = "lidar"
//! min_dist_xyz_between_keyframes = 1.0
//! max_kfs_local_graph = 75
//!
//! [params.icp]
//! max_iterations = 50
//! threshold_dist = 1.25
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{FrontEndError, Result};
use crate::matching::IcpOptions;

#[derive(Clone, Debug, Deserialize)]
struct ConfigFile {
    params: FrontEndConfig,
}

/// Front-end parameters.
///
/// `raw_sensor_label`, `min_dist_xyz_between_keyframes` and
/// `max_kfs_local_graph` are required; everything else has a default.
#[derive(Clone, Debug, Deserialize)]
pub struct FrontEndConfig {
    /// Only observations with this sensor label are processed.
    pub raw_sensor_label: String,

    /// Accumulated translation (meters) that promotes a new keyframe.
    pub min_dist_xyz_between_keyframes: f64,

    /// Cap on the number of keyframes kept in the local graph.
    pub max_kfs_local_graph: usize,

    /// Minimum gap between processed scans, in seconds.
    #[serde(default)]
    pub min_time_between_scans: f64,

    /// Registration quality gate in [0, 1].
    #[serde(default)]
    pub min_icp_goodness: f64,

    /// If > 0, override ICP decimation to aim for this matched point count.
    #[serde(default)]
    pub decimate_to_point_count: usize,

    /// Worker threads on the best-effort probe pool.
    #[serde(default = "default_probe_workers")]
    pub probe_workers: usize,

    /// ICP kernel options.
    #[serde(default)]
    pub icp: IcpOptions,
}

fn default_probe_workers() -> usize {
    2
}

impl FrontEndConfig {
    /// Build a configuration from the required keys, defaults elsewhere.
    pub fn new(
        raw_sensor_label: impl Into<String>,
        min_dist_xyz_between_keyframes: f64,
        max_kfs_local_graph: usize,
    ) -> Self {
        Self {
            raw_sensor_label: raw_sensor_label.into(),
            min_dist_xyz_between_keyframes,
            max_kfs_local_graph,
            min_time_between_scans: 0.0,
            min_icp_goodness: 0.0,
            decimate_to_point_count: 0,
            probe_workers: default_probe_workers(),
            icp: IcpOptions::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FrontEndError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        file.params.validate()?;
        Ok(file.params)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.raw_sensor_label.is_empty() {
            return Err(FrontEndError::Config(
                "raw_sensor_label must not be empty".into(),
            ));
        }
        if self.min_dist_xyz_between_keyframes <= 0.0 {
            return Err(FrontEndError::Config(
                "min_dist_xyz_between_keyframes must be positive".into(),
            ));
        }
        if self.max_kfs_local_graph == 0 {
            return Err(FrontEndError::Config(
                "max_kfs_local_graph must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_icp_goodness) {
            return Err(FrontEndError::Config(
                "min_icp_goodness must be within [0, 1]".into(),
            ));
        }
        if self.min_time_between_scans < 0.0 {
            return Err(FrontEndError::Config(
                "min_time_between_scans must not be negative".into(),
            ));
        }
        if self.probe_workers == 0 {
            return Err(FrontEndError::Config(
                "probe_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_minimal_document_gets_defaults() {
        let config = FrontEndConfig::from_toml_str(
            r#"
            [params]
            raw_sensor_label = "lidar"
            min_dist_xyz_between_keyframes = 1.0
            max_kfs_local_graph = 75
            "#,
        )
        .expect("parse");

        assert_eq!(config.raw_sensor_label, "lidar");
        assert_relative_eq!(config.min_time_between_scans, 0.0);
        assert_relative_eq!(config.min_icp_goodness, 0.0);
        assert_eq!(config.decimate_to_point_count, 0);
        assert_eq!(config.probe_workers, 2);
        assert_eq!(config.icp.max_iterations, 50);
        assert_relative_eq!(config.icp.threshold_dist, 1.25);
    }

    #[test]
    fn test_full_document() {
        let config = FrontEndConfig::from_toml_str(
            r#"
            [params]
            raw_sensor_label = "velodyne"
            min_dist_xyz_between_keyframes = 2.5
            max_kfs_local_graph = 30
            min_time_between_scans = 0.09
            min_icp_goodness = 0.6
            decimate_to_point_count = 500
            probe_workers = 4

            [params.icp]
            max_iterations = 80
            threshold_dist = 0.9
            threshold_ang = 0.0349
            alfa = 0.3
            skip_cov_calculation = true
            corresponding_points_decimation = 10
            "#,
        )
        .expect("parse");

        assert_relative_eq!(config.min_dist_xyz_between_keyframes, 2.5);
        assert_eq!(config.max_kfs_local_graph, 30);
        assert_relative_eq!(config.min_icp_goodness, 0.6);
        assert_eq!(config.decimate_to_point_count, 500);
        assert_eq!(config.probe_workers, 4);
        assert_eq!(config.icp.max_iterations, 80);
        assert!(config.icp.skip_cov_calculation);
        assert_eq!(config.icp.corresponding_points_decimation, 10);
    }

    #[test]
    fn test_missing_required_key_fails() {
        let result = FrontEndConfig::from_toml_str(
            r#"
            [params]
            raw_sensor_label = "lidar"
            max_kfs_local_graph = 75
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_goodness_fails() {
        let result = FrontEndConfig::from_toml_str(
            r#"
            [params]
            raw_sensor_label = "lidar"
            min_dist_xyz_between_keyframes = 1.0
            max_kfs_local_graph = 75
            min_icp_goodness = 1.5
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_graph_cap_fails() {
        let mut config = FrontEndConfig::new("lidar", 1.0, 5);
        config.max_kfs_local_graph = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r#"
            [params]
            raw_sensor_label = "lidar"
            min_dist_xyz_between_keyframes = 1.0
            max_kfs_local_graph = 10
            "#
        )
        .expect("write");

        let config = FrontEndConfig::load(file.path()).expect("load");
        assert_eq!(config.max_kfs_local_graph, 10);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(FrontEndConfig::load(Path::new("/nonexistent/front_end.toml")).is_err());
    }
}
