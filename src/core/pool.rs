use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Bounded worker pool shared by all sources.
///
/// At most `max_workers` tasks run at once; the rest wait in a FIFO queue.
/// Workers are launched on demand and exit when the queue empties, so the
/// pool keeps no standing workers between bursts of work.
///
/// A task that panics is isolated inside its own spawned task; the pool
/// swallows the resulting `JoinError` and moves on. Callers that need
/// failure visibility must capture it inside the task body.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    max_workers: usize,
    state: Mutex<PoolState>,
    drained: Notify,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Task>,
    active_workers: usize,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        assert!(max_workers >= 1, "worker pool needs at least one worker");
        Self {
            inner: Arc::new(PoolInner {
                max_workers,
                state: Mutex::new(PoolState::default()),
                drained: Notify::new(),
            }),
        }
    }

    /// Enqueues a task and returns immediately, starting a worker if
    /// capacity allows.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.queue.push_back(Box::pin(task));
        }
        Self::spawn_workers(&self.inner);
    }

    /// Waits until every submitted task has finished executing.
    ///
    /// Do not submit further tasks while waiting here if exact drain
    /// semantics are required.
    pub async fn drain(&self) {
        loop {
            // Register interest before checking, so a completion between the
            // check and the await cannot be missed.
            let notified = self.inner.drained.notified();
            {
                let state = self.inner.state.lock().unwrap();
                if state.active_workers == 0 && state.queue.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    fn spawn_workers(inner: &Arc<PoolInner>) {
        let mut state = inner.state.lock().unwrap();
        while state.active_workers < inner.max_workers && !state.queue.is_empty() {
            state.active_workers += 1;
            let inner = Arc::clone(inner);
            tokio::spawn(Self::worker(inner));
        }
    }

    async fn worker(inner: Arc<PoolInner>) {
        loop {
            let task = {
                let mut state = inner.state.lock().unwrap();
                match state.queue.pop_front() {
                    Some(task) => task,
                    None => {
                        // Pop-or-exit happens under one lock, so a submit
                        // racing this exit either hands us the task or sees
                        // the decremented count and starts a replacement.
                        state.active_workers -= 1;
                        if state.active_workers == 0 {
                            inner.drained.notify_waiters();
                        }
                        return;
                    }
                }
            };
            // Executed in its own task so a panic becomes a JoinError
            // instead of unwinding through the worker.
            let _ = tokio::spawn(task).await;
        }
    }
}
