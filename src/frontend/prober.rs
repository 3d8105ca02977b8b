//! Nearby-keyframe probing.
//!
//! After a promotion the graph is re-anchored at the new keyframe and the
//! node at the median distance is picked as a probe candidate: close
//! enough that the pose estimate makes a usable initial guess, far enough
//! that the resulting factor adds information the odometry edge does not.
//! Near-adjacent pairs are covered by odometry edges and the truly far
//! ones belong to a loop-closure subsystem, not to odometry.

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::RelativePoseFactor;
use crate::core::types::{KeyframeId, PointCloud3D, Pose3D, INVALID_FACTOR_ID};
use crate::error::{FrontEndError, Result};
use crate::graph::ordered_pair;

use super::state::FrontEndState;
use super::FrontEndInner;

/// Accepted probe corrections must stay below this fraction of the
/// initial guess; a larger jump means the kernel converged somewhere the
/// motion history does not support.
const MAX_CORRECTION_RATIO: f64 = 0.20;

/// Whether a candidate pair needs no probe: consecutive ids are already
/// tied by an odometry edge, and a recorded pair was dispatched before.
pub(crate) fn pair_already_handled(
    root: KeyframeId,
    candidate: KeyframeId,
    checked_pairs: &HashSet<(KeyframeId, KeyframeId)>,
) -> bool {
    root.abs_diff(candidate) < 2 || checked_pairs.contains(&ordered_pair(root, candidate))
}

impl FrontEndInner {
    /// Select a past keyframe worth probing against the current root and
    /// dispatch a best-effort registration task for it.
    ///
    /// Runs on the odometry worker right after a promotion. Failures here
    /// only cost an opportunity, so everything is logged and swallowed.
    pub(crate) fn check_for_nearby_keyframes(&self, state: &mut FrontEndState) {
        let root = state.last_kf;

        let (candidate, init_guess, from_pc, to_pc) = {
            let mut graph = self.graph.lock();
            let by_distance = graph.rebuild_distances(root);
            graph.evict_far(self.config.max_kfs_local_graph);

            let remaining: Vec<(f64, KeyframeId)> = by_distance
                .into_iter()
                .filter(|&(_, id)| graph.contains_node(id))
                .collect();
            if remaining.is_empty() {
                return;
            }
            let (_, candidate) = remaining[remaining.len() / 2];

            let Some(init_guess) = graph.node_pose(candidate).copied() else {
                return;
            };
            let (Some(from_pc), Some(to_pc)) = (graph.cloud(root), graph.cloud(candidate)) else {
                return;
            };
            (candidate, init_guess, from_pc, to_pc)
        };

        if pair_already_handled(root, candidate, &state.checked_pairs) {
            return;
        }

        // Another front-end may have tied these two already; the world
        // model is the only cross-front-end dedup until factors carry an
        // author annotation.
        if let Some(world_model) = &self.world_model {
            if world_model.entity_neighbors(candidate).contains(&root) {
                log::debug!(
                    "Skipping pair check: a factor already exists between #{} and #{}",
                    candidate,
                    root
                );
                return;
            }
        }

        state.checked_pairs.insert(ordered_pair(root, candidate));

        let Some(inner) = self.self_ref.upgrade() else {
            return;
        };
        let accepted = self.probe_pool.try_execute(move || {
            if let Err(e) = inner.probe_candidate(root, candidate, from_pc, to_pc, init_guess) {
                log::error!("Probe task for (#{}, #{}) failed: {}", root, candidate, e);
            }
        });
        if !accepted {
            log::warn!(
                "Probe pool rejected task for pair (#{}, #{})",
                root,
                candidate
            );
        }
    }

    /// Register the candidate against the root and, if the result is both
    /// good and consistent with the graph estimate, emit a non-adjacent
    /// factor.
    pub(crate) fn probe_candidate(
        &self,
        from: KeyframeId,
        to: KeyframeId,
        from_pc: Arc<PointCloud3D>,
        to_pc: Arc<PointCloud3D>,
        init_guess: Pose3D,
    ) -> Result<()> {
        let result = self.registration.register(&from_pc, &to_pc, &init_guess)?;

        let correction = result.pose.relative_to(&init_guess).translation_norm();
        let correction_ratio = correction / (init_guess.translation_norm() + 0.01);

        log::debug!(
            "Probe #{} ==> #{}: goodness={:.3} correction={:.3} m ({:.1}% of guess)",
            from,
            to,
            result.goodness,
            correction,
            100.0 * correction_ratio
        );

        if result.goodness <= self.config.min_icp_goodness
            || correction_ratio >= MAX_CORRECTION_RATIO
        {
            return Ok(());
        }

        let response = self.backend.add_factor(RelativePoseFactor {
            from,
            to,
            rel_pose: result.pose,
        });
        match (response.success, response.new_factor_id) {
            (true, Some(id)) if id != INVALID_FACTOR_ID => {}
            _ => {
                return Err(FrontEndError::Backend(
                    "non-adjacent factor was rejected".into(),
                ))
            }
        }

        self.graph.lock().insert_edge(from, to, result.pose);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_ids_are_handled() {
        let checked = HashSet::new();
        assert!(pair_already_handled(5, 5, &checked));
        assert!(pair_already_handled(5, 4, &checked));
        assert!(pair_already_handled(4, 5, &checked));
        assert!(!pair_already_handled(5, 3, &checked));
    }

    #[test]
    fn test_checked_pair_is_handled_in_either_order() {
        let mut checked = HashSet::new();
        checked.insert(ordered_pair(7, 3));
        assert!(pair_already_handled(7, 3, &checked));
        assert!(pair_already_handled(3, 7, &checked));
        assert!(!pair_already_handled(7, 2, &checked));
    }
}
