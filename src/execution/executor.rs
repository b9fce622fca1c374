//! Distributed map executor - order-preserving parallel map over work items

use crate::core::MapError;
use crate::execution::cluster::ClusterHandle;
use crate::handler::HandlerError;
use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs one function over many items on the cluster
#[derive(Debug, Clone)]
pub struct MapExecutor {
    cluster: ClusterHandle,
}

impl MapExecutor {
    pub fn new(cluster: ClusterHandle) -> Self {
        Self { cluster }
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    /// Apply `f` to every item, sharing one context value between all calls
    ///
    /// `result[i]` always belongs to `items[i]`, whatever order the items
    /// finish in. The call returns only once every item is done (or the first
    /// failure is seen, in which case the remaining items are aborted).
    pub async fn map<T, S, R, F, Fut>(
        &self,
        items: Vec<T>,
        shared: Arc<S>,
        f: F,
    ) -> Result<Vec<R>, MapError>
    where
        T: Send + 'static,
        S: Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(usize, T, Arc<S>) -> Fut,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        if self.cluster.is_stopped() {
            return Err(MapError::ClusterStopped);
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let total = items.len();
        debug!("Dispatching {} items to {} worker slots", total, self.cluster.cores());

        let slots = self.cluster.slots();
        let handles: Vec<JoinHandle<Result<R, MapError>>> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let work = f(index, item, shared.clone());
                let slots = slots.clone();
                tokio::spawn(async move {
                    let _permit = slots
                        .acquire_owned()
                        .await
                        .map_err(|_| MapError::ClusterStopped)?;
                    work.await.map_err(|source| MapError::Item { index, source })
                })
            })
            .collect();

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let joined = try_join_all(handles.into_iter().enumerate().map(|(index, handle)| async move {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(MapError::Panicked { index }),
                Err(_) => Err(MapError::ClusterStopped),
            }
        }));

        let result = match self.cluster.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, joined)
                .await
                .unwrap_or(Err(MapError::DeadlineExceeded(deadline))),
            None => joined.await,
        };

        if let Err(ref e) = result {
            warn!("Map over {} items failed: {}", total, e);
            for abort in &aborts {
                abort.abort();
            }
        }

        result
    }
}
