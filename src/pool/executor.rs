//! Bounded job pool
//!
//! Every job runs on its own tokio task, gated by a semaphore holding
//! `concurrency` permits:
//! - `submit` waits for a permit, spawns the job and returns immediately
//! - the job's task resolves its [`Status`] and then drops its permit
//! - `stop` drains every permit and closes the semaphore for good

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, debug_span, error, info, instrument, warn, Instrument};

use crate::batch::Batch;
use crate::pool::config::PoolConfig;
use crate::pool::status::{JobResult, Status};
use crate::{PoolError, Result};

/// Worker pool running at most `concurrency` jobs at a time.
///
/// Cloning a `Pool` yields another handle to the same gate.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    name: String,
    concurrency: usize,
    permits: Arc<Semaphore>,
    next_job_id: AtomicU64,
}

impl Pool {
    /// Create a pool guaranteeing no more than `concurrency` running jobs.
    ///
    /// # Panics
    ///
    /// Panics if `concurrency` is 0. Use [`Pool::try_new`] for a non-panicking version.
    pub fn new(concurrency: usize) -> Self {
        Self::with_config(PoolConfig::new(concurrency))
    }

    /// Create a pool from a full configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn with_config(config: PoolConfig) -> Self {
        match Self::try_new(config) {
            Ok(pool) => pool,
            Err(e) => {
                error!(error = %e, "Refusing to build pool");
                panic!("{}", e);
            }
        }
    }

    /// Create a pool, returning an error for an invalid configuration
    pub fn try_new(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        info!(
            pool = %config.name,
            concurrency = config.concurrency,
            "Creating job pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.concurrency)),
                concurrency: config.concurrency,
                name: config.name,
                next_job_id: AtomicU64::new(0),
            }),
        })
    }

    /// Pool name used in log fields
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Maximum number of simultaneously running jobs
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Number of free execution slots
    pub fn available_slots(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Returns true once [`Pool::stop`] has completed
    pub fn is_stopped(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Submit a job to the pool.
    ///
    /// Waits until the concurrency limit allows the job to start, then launches
    /// it on a new task. Returns a [`Status`] right after admission, not after
    /// completion.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been stopped.
    pub async fn submit<F, Fut>(&self, job: F) -> Status
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let permit = match self.inner.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(pool = %self.inner.name, "Job submitted to a stopped pool");
                panic!("{}", PoolError::Stopped(self.inner.name.clone()));
            }
        };

        let job_id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);
        let (completion, status) = Status::pending(job_id);

        debug!(
            pool = %self.inner.name,
            job_id = job_id,
            free_slots = self.inner.permits.available_permits(),
            "Job admitted"
        );

        let span = debug_span!("job", pool = %self.inner.name, job_id = job_id);
        tokio::spawn(
            async move {
                let outcome = run_job(job).await;
                completion.resolve(outcome);
                // Waiters are woken before the slot frees up
                drop(permit);
            }
            .instrument(span),
        );

        status
    }

    /// Block until all submitted jobs have completed, then retire the pool.
    ///
    /// # Panics
    ///
    /// Panics if called more than once. Submitting to a stopped pool also panics.
    #[instrument(skip(self), fields(pool = %self.inner.name, concurrency = self.inner.concurrency))]
    pub async fn stop(&self) {
        // acquire_many takes a u32, so drain the permits in chunks
        let mut remaining = self.inner.concurrency;
        while remaining > 0 {
            let chunk = remaining.min(u32::MAX as usize) as u32;
            match self.inner.permits.acquire_many(chunk).await {
                Ok(permits) => permits.forget(),
                Err(_) => {
                    error!("Pool stopped twice");
                    panic!("{}", PoolError::Stopped(self.inner.name.clone()));
                }
            }
            remaining -= chunk as usize;
        }

        self.inner.permits.close();
        info!("Pool stopped");
    }

    /// Create a new group of jobs sharing this pool
    pub fn batch(&self) -> Batch {
        Batch::new(self.clone())
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("concurrency", &self.inner.concurrency)
            .field("available_slots", &self.available_slots())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Run a job to completion, turning a panic into a job error
async fn run_job<F, Fut>(job: F) -> JobResult
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    debug!("Job starting");

    match AssertUnwindSafe(async move { job().await }).catch_unwind().await {
        Ok(Ok(())) => {
            debug!("Job completed");
            Ok(())
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Job failed");
            Err(e.into())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(panic = %message, "Job panicked");
            Err(PoolError::JobPanicked(message).into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
