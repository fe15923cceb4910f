//! Bounded fan-out with an explicit join.
//!
//! Every unit of work runs as its own task behind a shared semaphore. The
//! join waits for all of them and returns results in submission order, so
//! callers never see partial output and no task outlives the call.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::AgentError;

/// Worker pool scoped to one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    max_parallel: usize,
}

impl WorkerPool {
    /// Creates a pool running at most `max_parallel` units at once.
    ///
    /// Zero is treated as one.
    #[must_use]
    pub const fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: if max_parallel == 0 { 1 } else { max_parallel },
        }
    }

    /// Maximum units in flight.
    #[must_use]
    pub const fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Runs `work` for every item and joins.
    ///
    /// The output has one entry per item, in input order. A panicking or
    /// cancelled task yields [`AgentError::Orchestration`] in its slot and
    /// leaves its siblings untouched.
    pub async fn run_all<I, T, F, Fut>(&self, items: Vec<I>, work: F) -> Vec<Result<T, AgentError>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, AgentError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let sem = Arc::clone(&semaphore);
            let fut = work(item);
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.map_err(|e| AgentError::Orchestration {
                    message: format!("Semaphore acquire failed: {e}"),
                })?;
                fut.await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(AgentError::Orchestration {
                    message: format!("Task join failed: {e}"),
                })),
            }
        }
        results
    }
}
