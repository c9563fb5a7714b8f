use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::error::FloodError;

/// Types
pub type WorkerEventSender = tokio::sync::mpsc::Sender<WorkerEvent>;

/// Outcome of a connection worker, reported to the supervisor.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The worker ended cleanly after drawing this many tiles.
    Finished(usize, u64),
    /// The worker stopped with an error.
    Failed(usize, FloodError),
}

impl WorkerEvent {
    pub fn index(&self) -> usize {
        match self {
            WorkerEvent::Finished(index, _) | WorkerEvent::Failed(index, _) => *index,
        }
    }
}

/// Tracks the spawned connection workers.
///
/// Workers never act on their own failures; they report a
/// [`WorkerEvent`] and the owner of the pool decides what to do.
pub struct WorkerPool {
    tasks: HashMap<usize, tokio::task::JoinHandle<()>>,
    pool_rx: tokio::sync::mpsc::Receiver<WorkerEvent>,
    pool_tx: WorkerEventSender,
}

impl WorkerPool {
    pub fn new() -> Self {
        let (pool_tx, pool_rx) = tokio::sync::mpsc::channel(64);
        Self {
            tasks: HashMap::new(),
            pool_rx,
            pool_tx,
        }
    }

    /// Spawn worker `index`. Its result arrives later through
    /// [`recv`](Self::recv); a panic is reported as [`FloodError::Task`].
    pub fn spawn<F>(&mut self, index: usize, work: F)
    where
        F: Future<Output = Result<u64, FloodError>> + Send + 'static,
    {
        let event_tx = self.pool_tx.clone();
        let handle = tokio::spawn(async move {
            let event = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(drawn)) => WorkerEvent::Finished(index, drawn),
                Ok(Err(e)) => WorkerEvent::Failed(index, e),
                Err(_) => WorkerEvent::Failed(
                    index,
                    FloodError::Task(format!("worker {index} panicked")),
                ),
            };
            let _ = event_tx.send(event).await;
        });
        self.tasks.insert(index, handle);
    }

    /// Workers that have not reported yet.
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next worker to finish.
    ///
    /// Returns `None` once every worker has reported.
    pub async fn recv(&mut self) -> Option<WorkerEvent> {
        if self.tasks.is_empty() {
            return None;
        }
        let event = self.pool_rx.recv().await?;
        self.tasks.remove(&event.index());
        Some(event)
    }

    /// Abort every worker that is still running.
    pub fn abort_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// Wait for every running worker to stop, discarding their events.
    pub async fn join_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            let _ = handle.await;
        }
        while self.pool_rx.try_recv().is_ok() {}
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reports_each_worker_once() {
        let mut pool = WorkerPool::new();
        pool.spawn(0, async { Ok(3) });
        pool.spawn(1, async { Err(FloodError::ChannelClosed) });
        assert_eq!(pool.active(), 2);

        let mut finished = Vec::new();
        let mut failed = Vec::new();
        while let Some(event) = pool.recv().await {
            match event {
                WorkerEvent::Finished(i, n) => finished.push((i, n)),
                WorkerEvent::Failed(i, _) => failed.push(i),
            }
        }

        assert_eq!(finished, vec![(0, 3)]);
        assert_eq!(failed, vec![1]);
        assert!(pool.is_empty());
        assert!(pool.recv().await.is_none());
    }

    #[tokio::test]
    async fn panicking_worker_is_reported() {
        let mut pool = WorkerPool::new();
        pool.spawn(3, async {
            let drawn: Option<u64> = None;
            Ok(drawn.expect("worker lost its count"))
        });

        let event = tokio::time::timeout(Duration::from_secs(5), pool.recv())
            .await
            .expect("a panic must not leave recv waiting")
            .unwrap();
        assert!(matches!(event, WorkerEvent::Failed(3, FloodError::Task(_))));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn abort_all_stops_workers() {
        let mut pool = WorkerPool::new();
        pool.spawn(0, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        });
        pool.abort_all();
        assert_eq!(pool.active(), 0);
        assert!(pool.recv().await.is_none());
    }
}
