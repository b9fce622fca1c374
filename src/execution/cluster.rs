//! Worker pool lifecycle - the "cluster" the map executor dispatches to

use crate::core::config::ClusterConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;

/// Handle to a running worker pool
///
/// Cloning the handle shares the pool. Work items each run as their own tokio
/// task and hold one slot while running.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    slots: Arc<Semaphore>,
    cores: usize,
    deadline: Option<Duration>,
}

/// Start a worker pool sized from the configuration
pub fn start_cluster(config: &ClusterConfig) -> ClusterHandle {
    let cores = config.cores.unwrap_or_else(default_cores).max(1);
    let deadline = config.timeout_secs.map(Duration::from_secs);
    info!("Starting cluster with {} worker slots", cores);
    ClusterHandle {
        slots: Arc::new(Semaphore::new(cores)),
        cores,
        deadline,
    }
}

fn default_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl ClusterHandle {
    /// Number of work items that may run at once
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Deadline applied to each whole map call
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Override the map deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn slots(&self) -> Arc<Semaphore> {
        self.slots.clone()
    }

    /// Stop the pool; later map calls fail and waiting items never start
    pub fn stop(&self) {
        if !self.slots.is_closed() {
            info!("Stopping cluster");
            self.slots.close();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.slots.is_closed()
    }
}
