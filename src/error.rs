//! Errors reported by a mapreduce job.

use std::any::Any;
use std::io;
use thiserror::Error;

/// Result type for job operations.
pub type MRResult<T> = Result<T, MRError>;

#[derive(Error, Debug)]
pub enum MRError {
    /// A job needs at least one worker thread.
    #[error("invalid concurrency: need at least one worker thread, got {0}")]
    InvalidConcurrency(usize),

    /// The operating system refused to create a worker thread.
    #[error("could not spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    /// The map() or reduce() function panicked on a worker; the job was abandoned.
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    /// The job was abandoned because another worker failed.
    #[error("job abandoned after a failure on another worker")]
    Abandoned,
}

impl MRError {
    /// Builds a WorkerPanicked error from a panic payload as returned by catch_unwind() or
    /// JoinHandle::join().
    pub fn from_panic(worker: usize, payload: Box<dyn Any + Send>) -> MRError {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            String::from(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("<non-string panic payload>")
        };
        MRError::WorkerPanicked { worker, message }
    }

    /// Whether this error is the primary failure of a job (as opposed to the knock-on effect
    /// on the other workers).
    pub fn is_primary(&self) -> bool {
        !matches!(self, MRError::Abandoned)
    }
}
