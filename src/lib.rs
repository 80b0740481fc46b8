//! # gobs
//!
//! A bounded-concurrency job pool. Every submitted job runs on its own tokio
//! task, but no more than `concurrency` jobs run at any instant. Each job gets a
//! [`Status`](pool::Status) handle to await its outcome, and jobs can be grouped
//! into a [`Batch`](batch::Batch) that folds member failures into a single
//! [`MultiError`](batch::MultiError).
//!
//! ## Quick Start
//!
//! ```rust
//! use gobs::pool::Pool;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Pool::new(2);
//!
//! // Suspends only while both slots are busy
//! let status = pool.submit(|| async {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     Ok(())
//! }).await;
//! status.wait().await?;
//!
//! let batch = pool.batch();
//! batch.submit(|| async { anyhow::bail!("an error 1 occurred") }).await;
//! batch.submit(|| async { anyhow::bail!("an error 2 occurred") }).await;
//! batch.submit(|| async { Ok(()) }).await;
//!
//! if let Err(err) = batch.wait().await {
//!     // "an error N occurred (and 1 more errors)"
//!     assert_eq!(err.errors().len(), 2);
//! }
//!
//! pool.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`pool`]: the capacity gate, job status handles and pool configuration
//! - [`batch`]: job groups with a joint wait and error aggregation
//! - [`utils`]: tracing setup for binaries and tests

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Main error type for pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Concurrency must allow at least one running job
    #[error("concurrency must be >= 1 (got {0})")]
    InvalidConcurrency(usize),

    /// Concurrency is above what the permit semaphore can hold
    #[error("concurrency {0} exceeds the permit limit")]
    ConcurrencyTooLarge(usize),

    /// A configuration value could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The pool has been stopped and no longer admits jobs
    #[error("pool '{0}' has been stopped")]
    Stopped(String),

    /// A job panicked instead of returning
    #[error("job panicked: {0}")]
    JobPanicked(String),

    /// A job's task was torn down before it reported an outcome
    #[error("job was abandoned before completing")]
    JobAbandoned,
}

/// Capacity gate, job status and configuration
pub mod pool;

/// Job groups with aggregated error reporting
pub mod batch;

/// Utility functions and helpers
pub mod utils;

pub use batch::{Batch, MultiError};
pub use pool::{JobError, Pool, PoolConfig, Status};
