//! Batches of jobs with a joint wait
//!
//! Each member job is a regular pool job. Next to it, a folding task waits on
//! the job's [`Status`] and records any failure in the batch's collector.
//! Every folding task holds a clone of the batch's `mpsc::Sender`; the joint
//! wait drops the batch's own sender and returns once the channel closes,
//! i.e. once the last folding task is done.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::batch::aggregation::{ErrorCollector, MultiError};
use crate::pool::{Pool, Status};

/// A group of jobs run in a [`Pool`], awaited together.
///
/// Created with [`Pool::batch`].
pub struct Batch {
    pool: Pool,
    errors: Arc<ErrorCollector>,
    in_flight: Arc<AtomicUsize>,
    submitted: AtomicUsize,
    folded_tx: mpsc::Sender<()>,
    folded_rx: mpsc::Receiver<()>,
    started: Instant,
}

impl Batch {
    pub(crate) fn new(pool: Pool) -> Self {
        // Nothing is ever sent: the channel only tracks live senders
        let (folded_tx, folded_rx) = mpsc::channel(1);
        Self {
            pool,
            errors: Arc::new(ErrorCollector::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            submitted: AtomicUsize::new(0),
            folded_tx,
            folded_rx,
            started: Instant::now(),
        }
    }

    /// Add a job to the batch.
    ///
    /// Waits, like [`Pool::submit`], only until the pool admits the job. The
    /// returned [`Status`] can be awaited independently of [`Batch::wait`].
    pub async fn submit<F, Fut>(&self, job: F) -> Status
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let status = self.pool.submit(job).await;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let waiter = status.clone();
        let errors = self.errors.clone();
        let in_flight = self.in_flight.clone();
        let folded = self.folded_tx.clone();
        tokio::spawn(async move {
            let outcome = waiter.wait().await;
            debug!(job_id = waiter.id(), ok = outcome.is_ok(), "Folding batch job outcome");
            errors.add(outcome.err());
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(folded);
        });

        status
    }

    /// Number of member jobs not yet finished and folded
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of jobs submitted to this batch so far
    pub fn len(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns true when no job has been submitted yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every job of the batch has completed.
    ///
    /// Returns a [`MultiError`] holding each individual failure, or `Ok(())`
    /// if every job succeeded. Consumes the batch: no job can be added once
    /// the wait has begun.
    #[instrument(skip(self), fields(pool = %self.pool.name(), jobs = self.len()))]
    pub async fn wait(self) -> Result<(), MultiError> {
        let Batch {
            errors,
            folded_tx,
            mut folded_rx,
            started,
            ..
        } = self;

        drop(folded_tx);
        // Yields None once every folding task has dropped its sender
        while folded_rx.recv().await.is_some() {}

        let failed = errors.len();
        match errors.finish() {
            Some(multi) => {
                warn!(
                    failed = failed,
                    duration_ms = started.elapsed().as_millis(),
                    error = %multi,
                    "Batch completed with errors"
                );
                Err(multi)
            }
            None => {
                info!(
                    duration_ms = started.elapsed().as_millis(),
                    "Batch completed"
                );
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("pool", &self.pool.name())
            .field("submitted", &self.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
