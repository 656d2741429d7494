//! Implements a mapreduce process bounded to one process and a fixed set of threads.
//!
//! Every worker thread maps a share of the input (claimed one record at a time), sorts its
//! output, and waits for the others at a barrier. The first worker then merges all sorted
//! outputs into groups of equal keys and feeds them to a queue, from which all workers
//! reduce. See `controller::MRController` for how to run a job.
//!

pub mod barrier;
pub mod closure_mr;
pub mod controller;
pub mod error;
pub mod map;
pub mod mapreducer;
pub mod parameters;
pub mod record_types;
pub mod reduce;
pub mod shard_merge;
pub mod shuffle;
pub mod sort;
pub mod state;
pub mod util;
pub mod worker;

pub use closure_mr::ClosureMapReducer;
pub use controller::{JobHandle, MRController};
pub use error::{MRError, MRResult};
pub use mapreducer::MapReducer;
pub use parameters::{MRParameters, MergeStrategy};
pub use record_types::{MEmitter, MultiRecord, OutputSink, REmitter, Record};
pub use state::{JobState, Stage};
pub use worker::JobStats;
