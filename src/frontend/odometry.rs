//! Odometry stage: scan-to-scan registration with a constant-velocity
//! motion prior.
//!
//! Runs on the single odometry worker. The predictor/corrector loop is a
//! fold over consecutive scans: the twist estimated from the previous
//! registration seeds the initial guess of the next one.

use std::sync::Arc;

use crate::core::types::Observation;
use crate::error::Result;

use super::FrontEndInner;

impl FrontEndInner {
    /// Process one observation end to end: filter by time, convert, shift
    /// state, register against the previous scan, and hand the result to
    /// the keyframe promoter.
    pub(crate) fn process_observation(&self, obs: Observation) -> Result<()> {
        let obs = Arc::new(obs);
        let mut state = self.state.lock();

        // Only process scans that are sufficiently apart in time.
        if let Some(last_tim) = state.last_obs_tim {
            let gap = obs.timestamp_us.saturating_sub(last_tim) as f64 * 1e-6;
            if gap < self.config.min_time_between_scans {
                return Ok(());
            }
        }

        let Some(cloud) = obs.point_cloud() else {
            log::warn!(
                "Observation from `{}` at t={}us could not be converted into a point cloud; \
                 doing nothing",
                obs.sensor_label,
                obs.timestamp_us
            );
            return Ok(());
        };
        let cloud = Arc::new(cloud);

        // Shift state: the new scan becomes the reference for the next one.
        let prev_tim = state.last_obs_tim.replace(obs.timestamp_us);
        state.last_obs = Some(Arc::clone(&obs));
        let prev_points = state.last_points.replace(Arc::clone(&cloud));

        let Some(prev_points) = prev_points else {
            log::debug!("First point cloud: skipping registration");
            return Ok(());
        };

        let dt = prev_tim
            .map(|t| obs.timestamp_us.saturating_sub(t) as f64 * 1e-6)
            .unwrap_or(0.0);

        let guess = state.last_twist.motion_guess(dt);
        let result = self.registration.register(&prev_points, &cloud, &guess)?;

        state.last_twist.update_from(&result.pose, dt);
        state.accum_since_last_kf = state.accum_since_last_kf.compose(&result.pose);
        let dist_since_last_kf = state.accum_since_last_kf.translation_norm();

        log::debug!(
            "Registered scan: points={} prev_points={} dt={:.3}s goodness={:.3} \
             twist=({:.3}, {:.3}, {:.3}) m/s",
            cloud.len(),
            prev_points.len(),
            dt,
            result.goodness,
            state.last_twist.vx,
            state.last_twist.vy,
            state.last_twist.vz,
        );
        log::debug!("Since last keyframe: dist={:.3} m", dist_since_last_kf);

        if result.goodness > self.config.min_icp_goodness
            && dist_since_last_kf > self.config.min_dist_xyz_between_keyframes
        {
            self.promote_keyframe(&mut state, &obs, &cloud)?;

            // Opportunistically tie the fresh keyframe to a nearby past one.
            if self.graph.lock().cloud_count() > 1 {
                self.check_for_nearby_keyframes(&mut state);
            }
        }

        Ok(())
    }
}
