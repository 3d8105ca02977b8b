//! The LiDAR odometry front-end.
//!
//! Turns an asynchronous stream of range-sensor observations into
//! keyframes, odometry factors and opportunistic non-adjacent factors for
//! an external SLAM back-end, while a bounded local pose graph keeps the
//! recent neighborhood of the trajectory in memory.
//!
//! Two worker pools separate the real-time path from the best-effort one:
//! a single-worker odometry pool owns all state mutation and sheds load
//! at ingress when it falls behind, and a probe pool runs non-adjacent
//! registrations that only ever append edges.

mod odometry;
mod promoter;
mod prober;
mod state;

pub use state::{FrontEndState, FrontEndStatus};

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::{SlamBackend, WorldModel};
use crate::config::FrontEndConfig;
use crate::core::types::Observation;
use crate::error::Result;
use crate::graph::LocalPoseGraph;
use crate::matching::{PointToPointIcp, Registration};
use crate::utils::WarnThrottle;
use crate::workers::WorkerPool;

/// Odometry queue bound: one task in flight plus one queued.
const ODOMETRY_QUEUE_CAPACITY: usize = 2;

/// Minimum period between repeated drop warnings.
const DROP_WARN_PERIOD: Duration = Duration::from_secs(5);

/// Shared guts of the front-end, reachable from worker tasks.
pub(crate) struct FrontEndInner {
    /// Self-reference handed to probe tasks so they outlive the
    /// dispatching call.
    pub(crate) self_ref: Weak<FrontEndInner>,
    pub(crate) config: FrontEndConfig,
    pub(crate) registration: Arc<dyn Registration>,
    pub(crate) backend: Arc<dyn SlamBackend>,
    pub(crate) world_model: Option<Arc<dyn WorldModel>>,
    pub(crate) state: Mutex<FrontEndState>,
    pub(crate) graph: Mutex<LocalPoseGraph>,
    pub(crate) probe_pool: WorkerPool,
}

/// Online LiDAR odometry and local pose-graph front-end.
///
/// Feed observations through [`on_observation`](Self::on_observation);
/// keyframes and factors flow to the [`SlamBackend`] collaborator.
pub struct LidarFrontEnd {
    inner: Arc<FrontEndInner>,
    odometry_pool: WorkerPool,
    drop_warn: WarnThrottle,
}

impl LidarFrontEnd {
    /// Create a front-end with an explicit registration implementation.
    pub fn new(
        config: FrontEndConfig,
        registration: Arc<dyn Registration>,
        backend: Arc<dyn SlamBackend>,
        world_model: Option<Arc<dyn WorldModel>>,
    ) -> Result<Self> {
        config.validate()?;

        let probe_workers = config.probe_workers;
        let inner = Arc::new_cyclic(|self_ref| FrontEndInner {
            self_ref: self_ref.clone(),
            config,
            registration,
            backend,
            world_model,
            state: Mutex::new(FrontEndState::new()),
            graph: Mutex::new(LocalPoseGraph::new()),
            probe_pool: WorkerPool::new("probe", probe_workers, None),
        });

        Ok(Self {
            inner,
            odometry_pool: WorkerPool::new("odometry", 1, Some(ODOMETRY_QUEUE_CAPACITY)),
            drop_warn: WarnThrottle::new(DROP_WARN_PERIOD),
        })
    }

    /// Create a front-end using the shipped point-to-point ICP, tuned
    /// from the configuration.
    pub fn with_icp(
        config: FrontEndConfig,
        backend: Arc<dyn SlamBackend>,
        world_model: Option<Arc<dyn WorldModel>>,
    ) -> Result<Self> {
        let registration = Arc::new(
            PointToPointIcp::new(config.icp.clone())
                .with_target_point_count(config.decimate_to_point_count),
        );
        Self::new(config, registration, backend, world_model)
    }

    /// Ingress from the sensor driver.
    ///
    /// Observations from other sensors are ignored. When the odometry
    /// worker already has a task in flight and one queued, the scan is
    /// dropped: the motion prior degrades quickly on stale data, so
    /// freshness beats completeness here.
    pub fn on_observation(&self, obs: Observation) {
        if obs.sensor_label != self.inner.config.raw_sensor_label {
            return;
        }

        if self.odometry_pool.pending_tasks() > 1 {
            if self.drop_warn.allow() {
                log::warn!("Dropping observation: odometry worker too busy");
            }
            return;
        }

        let inner = Arc::clone(&self.inner);
        let accepted = self.odometry_pool.try_execute(move || {
            if let Err(e) = inner.process_observation(obs) {
                log::error!("Odometry task failed: {}", e);
            }
        });
        if !accepted && self.drop_warn.allow() {
            log::warn!("Dropping observation: odometry queue is full");
        }
    }

    /// Snapshot of the pipeline state for observers and tests.
    pub fn status(&self) -> FrontEndStatus {
        let state = self.inner.state.lock();
        let graph = self.inner.graph.lock();
        let mut graph_nodes: Vec<_> = graph.node_ids().collect();
        graph_nodes.sort_unstable();
        FrontEndStatus {
            last_kf: state.last_kf,
            twist: state.last_twist,
            accum_distance: state.accum_since_last_kf.translation_norm(),
            last_obs_timestamp_us: state.last_obs_tim,
            graph_nodes,
            graph_edges: graph.edge_count(),
        }
    }

    /// Return to the bootstrap state and drop the local graph.
    ///
    /// Tasks already in flight finish against the fresh state.
    pub fn reset(&self) {
        *self.inner.state.lock() = FrontEndState::new();
        self.inner.graph.lock().clear();
    }

    /// Wait until both pools have finished every accepted task.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        // Odometry first: it is the only dispatcher of probe tasks.
        self.odometry_pool.wait_idle(timeout) && self.inner.probe_pool.wait_idle(timeout)
    }

    /// Drain both pools and join their workers. In-flight registrations
    /// are allowed to complete; there is no per-task cancellation.
    pub fn shutdown(&self) {
        self.odometry_pool.shutdown();
        self.inner.probe_pool.shutdown();
    }
}

impl Drop for LidarFrontEnd {
    fn drop(&mut self) {
        self.shutdown();
    }
}
