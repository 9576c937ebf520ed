//! Background cache writer.
//!
//! Prepared cache statements are handed to a bounded queue and applied
//! by a small worker pool, so a request never waits on cache writes and
//! a slow store cannot pile up unbounded work. When the queue is full
//! the batch is dropped and counted; the cache is repopulated on the
//! next successful fetch anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::store::{SqlStatement, SqlStore};

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
}

impl QueueCounters {
    fn snapshot(&self) -> WriteQueueStats {
        WriteQueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counter snapshot for logging and the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteQueueStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub applied: u64,
    pub failed: u64,
}

/// Cloneable producer handle. Sources keep one of these; the queue
/// itself stays with whoever owns the shutdown.
#[derive(Clone)]
pub struct CacheWriter {
    sender: mpsc::Sender<Vec<SqlStatement>>,
    counters: Arc<QueueCounters>,
}

impl CacheWriter {
    /// Queue one prepared write batch. Never blocks: a full queue drops
    /// the batch with a warning.
    pub fn enqueue(&self, statements: Vec<SqlStatement>) {
        if statements.is_empty() {
            return;
        }
        match self.sender.try_send(statements) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(batch)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Cache write queue full, dropping a batch of {} statements",
                    batch.len()
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Cache write queue is shut down, discarding batch");
            }
        }
    }

    pub fn stats(&self) -> WriteQueueStats {
        self.counters.snapshot()
    }
}

/// Owner of the worker pool. Workers run until every [`CacheWriter`]
/// handle is gone and the queue is drained.
pub struct CacheWriteQueue {
    writer: CacheWriter,
    workers: Vec<JoinHandle<()>>,
}

impl CacheWriteQueue {
    /// Spawn `worker_count` workers applying batches against `store`.
    pub fn start(store: Arc<dyn SqlStore>, capacity: usize, worker_count: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Vec<SqlStatement>>(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(QueueCounters::default());

        let mut workers = Vec::new();
        for worker_id in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let store = store.clone();
            let counters = counters.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let batch = { receiver.lock().await.recv().await };
                    let Some(batch) = batch else {
                        debug!("Cache writer {} draining complete", worker_id);
                        break;
                    };
                    match store.execute_all(&batch).await {
                        Ok(rows) => {
                            counters.applied.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                "Cache writer {} applied {} statements ({} rows)",
                                worker_id,
                                batch.len(),
                                rows
                            );
                        }
                        Err(error) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            warn!("Cache writer {} batch failed: {}", worker_id, error);
                        }
                    }
                }
            }));
        }

        CacheWriteQueue {
            writer: CacheWriter { sender, counters },
            workers,
        }
    }

    pub fn writer(&self) -> CacheWriter {
        self.writer.clone()
    }

    pub fn stats(&self) -> WriteQueueStats {
        self.writer.stats()
    }

    /// Wait for the workers to drain the queue and exit, returning the
    /// final counters. Every writer handle must be dropped first or
    /// this waits forever.
    pub async fn shutdown(self) -> WriteQueueStats {
        let CacheWriteQueue { writer, workers } = self;
        let counters = writer.counters.clone();
        drop(writer);
        for handle in workers {
            if let Err(error) = handle.await {
                warn!("Cache writer exited abnormally: {}", error);
            }
        }
        counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use crate::sql_compiler::QueryParam;
    use crate::store::{RowSet, StoreError, VecRowSet};

    #[derive(Default)]
    struct RecordingStore {
        executed: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SqlStore for RecordingStore {
        async fn query(
            &self,
            _sql: &str,
            _params: &[QueryParam],
        ) -> Result<Box<dyn RowSet>, StoreError> {
            Ok(Box::new(VecRowSet::new(Vec::new())))
        }

        async fn execute(&self, sql: &str, _params: &[QueryParam]) -> Result<u64, StoreError> {
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(1)
        }
    }

    /// Store whose execute blocks until the test opens the gate.
    struct GatedStore {
        inner: RecordingStore,
        entered: Notify,
        gate: Semaphore,
    }

    impl GatedStore {
        fn new() -> Self {
            GatedStore {
                inner: RecordingStore::default(),
                entered: Notify::new(),
                gate: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl SqlStore for GatedStore {
        async fn query(
            &self,
            sql: &str,
            params: &[QueryParam],
        ) -> Result<Box<dyn RowSet>, StoreError> {
            self.inner.query(sql, params).await
        }

        async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<u64, StoreError> {
            self.entered.notify_one();
            self.gate.acquire().await.unwrap().forget();
            self.inner.execute(sql, params).await
        }
    }

    fn batch(sql: &str) -> Vec<SqlStatement> {
        vec![SqlStatement::new(sql, Vec::new())]
    }

    #[tokio::test]
    async fn test_writes_drain_on_shutdown() {
        let store = Arc::new(RecordingStore::default());
        let queue = CacheWriteQueue::start(store.clone(), 8, 2);
        let writer = queue.writer();

        writer.enqueue(batch("DELETE FROM cb_sheets WHERE sheet_id = @p0"));
        writer.enqueue(batch("INSERT INTO cb_sheets (sheet_id) VALUES (@p0)"));
        drop(writer);
        queue.shutdown().await;

        let mut executed = store.executed();
        executed.sort();
        assert_eq!(executed.len(), 2);
        assert!(executed[0].starts_with("DELETE"));
        assert!(executed[1].starts_with("INSERT"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_batch() {
        let store = Arc::new(GatedStore::new());
        let queue = CacheWriteQueue::start(store.clone(), 1, 1);
        let writer = queue.writer();

        // First batch is picked up and parks inside execute
        writer.enqueue(batch("UPDATE one"));
        store.entered.notified().await;
        // Second fills the buffer, third has nowhere to go
        writer.enqueue(batch("UPDATE two"));
        writer.enqueue(batch("UPDATE three"));
        assert_eq!(writer.stats().dropped, 1);
        assert_eq!(writer.stats().enqueued, 2);

        store.gate.add_permits(8);
        drop(writer);
        let stats = queue.shutdown().await;

        let executed = store.inner.executed();
        assert_eq!(executed, vec!["UPDATE one", "UPDATE two"]);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_ignored() {
        let store = Arc::new(RecordingStore::default());
        let queue = CacheWriteQueue::start(store.clone(), 4, 1);
        let writer = queue.writer();

        writer.enqueue(Vec::new());
        assert_eq!(writer.stats().enqueued, 0);

        drop(writer);
        queue.shutdown().await;
        assert!(store.executed().is_empty());
    }
}
