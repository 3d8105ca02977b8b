//! Keyframe promotion.
//!
//! Promotion is translation-gated; a rotation threshold is reserved for
//! when the motion prior grows a rotational component.

use std::sync::Arc;

use crate::backend::{AddKeyFrameRequest, RelativePoseFactor};
use crate::core::types::{
    KeyframeId, Observation, PointCloud3D, Pose3D, INVALID_FACTOR_ID, INVALID_KEYFRAME_ID,
};
use crate::error::{FrontEndError, Result};

use super::state::FrontEndState;
use super::FrontEndInner;

impl FrontEndInner {
    /// Mint a new keyframe for the current scan and emit the odometry
    /// factor to the previous one.
    ///
    /// The back-end call is deliberately blocking: the keyframe id is the
    /// join key for everything that follows, so the promoter never
    /// proceeds with a dangling id. A back-end denial is a logic error
    /// and aborts the task.
    pub(crate) fn promote_keyframe(
        &self,
        state: &mut FrontEndState,
        obs: &Arc<Observation>,
        cloud: &Arc<PointCloud3D>,
    ) -> Result<()> {
        let response = self.backend.add_key_frame(AddKeyFrameRequest {
            timestamp_us: obs.timestamp_us,
            observation: Arc::clone(obs),
        });
        let new_kf = match (response.success, response.new_kf_id) {
            (true, Some(id)) if id != INVALID_KEYFRAME_ID => id,
            _ => {
                return Err(FrontEndError::Backend(
                    "keyframe proposal was rejected".into(),
                ))
            }
        };

        self.graph.lock().insert_node(new_kf, Arc::clone(cloud));

        if state.last_kf != INVALID_KEYFRAME_ID {
            self.submit_odometry_factor(state.last_kf, new_kf, state.accum_since_last_kf)?;
        }

        log::info!(
            "New keyframe #{}: moved {:.3} m since #{}",
            new_kf,
            state.accum_since_last_kf.translation_norm(),
            if state.last_kf == INVALID_KEYFRAME_ID {
                "none".to_string()
            } else {
                format!("{}", state.last_kf)
            }
        );

        state.accum_since_last_kf = Pose3D::identity();
        state.last_kf = new_kf;
        Ok(())
    }

    fn submit_odometry_factor(
        &self,
        from: KeyframeId,
        to: KeyframeId,
        rel_pose: Pose3D,
    ) -> Result<()> {
        let response = self.backend.add_factor(RelativePoseFactor { from, to, rel_pose });
        match (response.success, response.new_factor_id) {
            (true, Some(id)) if id != INVALID_FACTOR_ID => {}
            _ => {
                return Err(FrontEndError::Backend(
                    "odometry factor was rejected".into(),
                ))
            }
        }
        self.graph.lock().insert_edge(from, to, rel_pose);
        Ok(())
    }
}
