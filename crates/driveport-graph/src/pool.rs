//! Bounded worker pool for HTTP exchanges
//!
//! Every request the client sends runs as a task on a dedicated runtime
//! handle, gated by a semaphore. The caller awaits the task's join handle,
//! so results are delivered on whatever task or executor awaited the
//! operation, independent of where the network I/O ran.

use std::{future::Future, sync::Arc};

use driveport_core::domain::{DriveError, DriveResult};
use reqwest::RequestBuilder;
use tokio::{runtime::Handle, sync::Semaphore};
use tracing::trace;

use crate::response::RawResponse;

/// Default number of concurrent HTTP exchanges
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Runs HTTP exchanges on a runtime handle with a fixed concurrency limit
#[derive(Debug, Clone)]
pub struct WorkerPool {
    /// Semaphore for concurrency limiting
    semaphore: Arc<Semaphore>,
    /// Runtime the exchanges are spawned on
    handle: Handle,
    max_concurrent: usize,
}

impl WorkerPool {
    /// Creates a pool spawning onto `handle` with at most `max_concurrent`
    /// exchanges in flight. A limit of zero is raised to one.
    pub fn new(max_concurrent: usize, handle: Handle) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            handle,
            max_concurrent,
        }
    }

    /// Creates a pool on the runtime the caller is running in
    ///
    /// # Errors
    /// Fails with [`DriveError::General`] outside a tokio runtime.
    pub fn current(max_concurrent: usize) -> DriveResult<Self> {
        let handle = Handle::try_current().map_err(DriveError::general)?;
        Ok(Self::new(max_concurrent, handle))
    }

    /// Configured concurrency limit
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Runs `work` on the pool once a permit is free
    pub async fn run<F, T>(&self, work: F) -> DriveResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        let task = self.handle.spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(DriveError::general)?;
            Ok::<T, DriveError>(work.await)
        });

        task.await.map_err(DriveError::general)?
    }

    /// Sends `request` on the pool and reads the whole response
    ///
    /// The inner `Result` carries the transport outcome for the response
    /// parser to classify.
    pub async fn execute(
        &self,
        request: RequestBuilder,
    ) -> DriveResult<Result<RawResponse, reqwest::Error>> {
        self.run(async move {
            match request.send().await {
                Ok(response) => {
                    trace!(status = %response.status(), url = %response.url(), "HTTP exchange completed");
                    RawResponse::collect(response).await
                }
                Err(e) => Err(e),
            }
        })
        .await
    }
}
