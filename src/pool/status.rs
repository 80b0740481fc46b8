//! Per-job completion tracking
//!
//! A [`Status`] is resolved exactly once by the task running its job. Any
//! number of clones may wait on it, and all of them observe the same outcome.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::PoolError;

/// Outcome of a single job
pub type JobResult = std::result::Result<(), JobError>;

/// Error returned by a failed job.
///
/// Cheap to clone: every clone points at the same underlying error, so all
/// waiters of a [`Status`] see the identical value.
#[derive(Clone)]
pub struct JobError {
    inner: Arc<anyhow::Error>,
}

impl JobError {
    /// Returns true when both handles refer to the same captured error
    pub fn ptr_eq(&self, other: &JobError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The underlying error
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl From<anyhow::Error> for JobError {
    fn from(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }
}

impl From<PoolError> for JobError {
    fn from(error: PoolError) -> Self {
        anyhow::Error::new(error).into()
    }
}

impl Deref for JobError {
    type Target = anyhow::Error;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Tracks the completion of a submitted job
#[derive(Clone)]
pub struct Status {
    id: u64,
    done: watch::Receiver<Option<JobResult>>,
}

impl Status {
    /// Create a pending status and the sender that resolves it
    pub(crate) fn pending(id: u64) -> (Completion, Self) {
        let (tx, rx) = watch::channel(None);
        (Completion { id, tx }, Self { id, done: rx })
    }

    /// Pool-local identifier of the job
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true once the job has finished, without waiting
    pub fn is_done(&self) -> bool {
        self.done.borrow().is_some()
    }

    /// Wait until the job has terminated and return its outcome.
    ///
    /// Can be called any number of times, from any number of clones.
    pub async fn wait(&self) -> JobResult {
        let mut done = self.done.clone();
        let resolved = done
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone());
        match resolved {
            Ok(outcome) => outcome.unwrap_or(Ok(())),
            // Sender dropped without resolving: the task never got to report
            Err(_) => Err(PoolError::JobAbandoned.into()),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Status")
            .field("id", &self.id)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Write side of a [`Status`], owned by the job's task
pub(crate) struct Completion {
    id: u64,
    tx: watch::Sender<Option<JobResult>>,
}

impl Completion {
    /// Publish the job outcome to every waiter
    pub(crate) fn resolve(self, outcome: JobResult) {
        debug!(job_id = self.id, ok = outcome.is_ok(), "Resolving job status");
        // send_replace stores the value even when no receiver is left
        self.tx.send_replace(Some(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_wait_returns_resolved_outcome() {
        let (completion, status) = Status::pending(7);
        assert_eq!(status.id(), 7);
        assert!(!status.is_done());

        completion.resolve(Ok(()));
        assert!(status.is_done());
        assert!(status.wait().await.is_ok());
        assert!(status.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_all_waiters_share_the_same_error() {
        let (completion, status) = Status::pending(1);
        let other = status.clone();

        let waiter = tokio::spawn(async move { other.wait().await });
        completion.resolve(Err(anyhow!("disk full").into()));

        let first = status.wait().await.unwrap_err();
        let second = waiter.await.unwrap().unwrap_err();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_dropped_completion_reports_abandoned() {
        let (completion, status) = Status::pending(3);
        drop(completion);

        let err = status.wait().await.unwrap_err();
        assert_eq!(err.downcast_ref::<PoolError>(), Some(&PoolError::JobAbandoned));
    }

    #[test]
    fn test_job_error_from_pool_error() {
        let err: JobError = PoolError::JobPanicked("oops".to_string()).into();
        assert_eq!(err.to_string(), "job panicked: oops");
        assert!(err.ptr_eq(&err.clone()));
    }
}
