//! Error aggregation for batches
//!
//! Folding tasks push failures into an [`ErrorCollector`] concurrently. Once
//! the batch has drained, the collected failures become a [`MultiError`].

use std::fmt;

use parking_lot::Mutex;

use crate::pool::status::JobError;

/// Concurrent collector of job failures
#[derive(Debug, Default)]
pub(crate) struct ErrorCollector {
    errors: Mutex<Vec<JobError>>,
}

impl ErrorCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a failure. `None` is ignored.
    pub(crate) fn add(&self, error: Option<JobError>) {
        if let Some(error) = error {
            self.errors.lock().push(error);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Take everything recorded so far, `None` when nothing failed
    pub(crate) fn finish(&self) -> Option<MultiError> {
        let errors = std::mem::take(&mut *self.errors.lock());
        MultiError::from_errors(errors)
    }
}

/// An error made of several unrelated job failures.
///
/// Displays as the first recorded failure, followed by
/// `" (and K more errors)"` when more than one job failed.
/// Always holds at least one error.
#[derive(Clone)]
pub struct MultiError {
    errors: Vec<JobError>,
}

impl MultiError {
    /// Wrap a list of failures, `None` if the list is empty
    pub fn from_errors(errors: Vec<JobError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// All failures, in the order they were recorded
    pub fn errors(&self) -> &[JobError] {
        &self.errors
    }

    /// The failure used for the summary message
    pub fn first(&self) -> &JobError {
        &self.errors[0]
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false, kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume into the list of failures
    pub fn into_errors(self) -> Vec<JobError> {
        self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first())?;
        if self.errors.len() > 1 {
            write!(f, " (and {} more errors)", self.errors.len() - 1)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiError")
            .field("errors", &self.errors)
            .finish()
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = JobError;
    type IntoIter = std::vec::IntoIter<JobError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a JobError;
    type IntoIter = std::slice::Iter<'a, JobError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
