//! In-flight panel loads.
//!
//! Each container has at most one load running on the shared tokio runtime.
//! Completions come back over a channel and are applied by the thread that
//! owns the layout; removing a container aborts its task.

use futures::future::{BoxFuture, FutureExt};
use geopanes_core::ids::ContainerId;
use geopanes_core::panel::PanelContent;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Completion of one load.
#[derive(Debug)]
pub struct LoadEvent {
    pub container_id: ContainerId,
    /// Which spawn this completion belongs to; superseded generations are stale
    pub generation: u64,
    pub result: anyhow::Result<PanelContent>,
}

struct InFlight {
    generation: u64,
    abort: AbortHandle,
}

pub struct LoadTasks {
    handle: Handle,
    tx: async_channel::Sender<LoadEvent>,
    rx: async_channel::Receiver<LoadEvent>,
    in_flight: HashMap<ContainerId, InFlight>,
    next_generation: u64,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for LoadTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pending: Vec<_> = self.in_flight.keys().collect();
        pending.sort();
        f.debug_struct("LoadTasks")
            .field("pending", &pending)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LoadTasks {
    pub fn new(handle: Handle) -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            handle,
            tx,
            rx,
            in_flight: HashMap::new(),
            next_generation: 0,
            timeout: None,
        }
    }

    /// Fail loads that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Start loading content for a container, aborting any load it already
    /// had. Returns the generation of the new load.
    pub fn spawn(&mut self, container_id: ContainerId, fetch: BoxFuture<'static, anyhow::Result<PanelContent>>) -> u64 {
        self.cancel(container_id);
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();
        let timeout = self.timeout;

        let task = self.handle.spawn(async move {
            let guarded = AssertUnwindSafe(fetch).catch_unwind();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, guarded).await {
                    Ok(outcome) => outcome,
                    Err(_) => Ok(Err(anyhow::anyhow!("timed out after {}s", limit.as_secs_f32()))),
                },
                None => guarded.await,
            };
            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("panel loader panicked")),
            };
            // Receiver gone means the workspace was dropped
            let _ = tx
                .send(LoadEvent {
                    container_id,
                    generation,
                    result,
                })
                .await;
        });

        log::debug!("Spawned load #{} for {}", generation, container_id);
        self.in_flight.insert(
            container_id,
            InFlight {
                generation,
                abort: task.abort_handle(),
            },
        );
        generation
    }

    /// Abort the load of a container. Returns false if none was running.
    pub fn cancel(&mut self, container_id: ContainerId) -> bool {
        match self.in_flight.remove(&container_id) {
            Some(flight) => {
                flight.abort.abort();
                log::debug!("Cancelled load #{} for {}", flight.generation, container_id);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, container_id: ContainerId) -> bool {
        self.in_flight.contains_key(&container_id)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Claim a completion. True only if it belongs to the container's
    /// current load, which is then no longer pending.
    pub fn accept(&mut self, event: &LoadEvent) -> bool {
        match self.in_flight.get(&event.container_id) {
            Some(flight) if flight.generation == event.generation => {
                self.in_flight.remove(&event.container_id);
                true
            }
            _ => false,
        }
    }

    /// Completions that already arrived, without blocking.
    pub fn drain(&self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until a completion arrives or `timeout` passes.
    ///
    /// Must not be called from inside the runtime.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadEvent> {
        let rx = self.rx.clone();
        self.handle
            .block_on(async move { tokio::time::timeout(timeout, rx.recv()).await })
            .ok()
            .and_then(Result::ok)
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: LoadEvent) {
        let _ = self.tx.try_send(event);
    }
}

impl Drop for LoadTasks {
    fn drop(&mut self) {
        for (_, flight) in self.in_flight.drain() {
            flight.abort.abort();
        }
    }
}
