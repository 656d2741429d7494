//! Parameters for a mapreduce process.
//!

use crate::error::{MRError, MRResult};

/// How the shuffle phase combines the sorted outputs of all workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Merge the per-worker sorted buffers with a balanced tree of two-way merges;
    /// O(n log t) for n records from t workers.
    MergeTree,
    /// Concatenate all buffers and sort them again; O(n log n), but simple.
    ConcatSort,
}

#[derive(Clone, Debug)]
pub struct MRParameters {
    pub threads: usize,

    pub merge: MergeStrategy,

    pub reduce_group_prealloc_size: usize,

    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl MRParameters {
    pub fn new() -> MRParameters {
        MRParameters {
            threads: 4,
            merge: MergeStrategy::MergeTree,
            reduce_group_prealloc_size: 1,
            thread_name_prefix: String::from("mr-worker"),
            stack_size: None,
        }
    }

    /// Determines how many worker threads will be run. Every worker takes part in all phases:
    /// each maps a share of the input, and each reduces a share of the groups. The first
    /// worker additionally runs the shuffle.
    ///
    /// Default 4
    pub fn set_concurrency(mut self, threads: usize) -> MRParameters {
        self.threads = threads;
        self
    }

    /// How the sorted map outputs are merged before grouping.
    ///
    /// Default MergeStrategy::MergeTree
    pub fn set_merge_strategy(mut self, merge: MergeStrategy) -> MRParameters {
        self.merge = merge;
        self
    }

    /// prealloc_size: How big are the groups of keys in the reduce phase expected to be? (used for pre-allocating
    /// buffers)
    /// Default 1.
    pub fn set_reduce_group_opts(mut self, prealloc_size: usize) -> MRParameters {
        self.reduce_group_prealloc_size = prealloc_size;
        self
    }

    /// Prefix for the names of worker threads; the index of the worker is appended to it.
    /// Also shows up in log messages.
    /// Default: mr-worker
    pub fn set_name(mut self, prefix: String) -> MRParameters {
        self.thread_name_prefix = prefix;
        self
    }

    /// Stack size of worker threads, in bytes. Default: the platform's default for new threads.
    pub fn set_stack_size(mut self, size: usize) -> MRParameters {
        self.stack_size = Some(size);
        self
    }

    /// Checks the parameters before any thread is started.
    pub fn validate(&self) -> MRResult<()> {
        if self.threads < 1 || u32::try_from(self.threads).is_err() {
            return Err(MRError::InvalidConcurrency(self.threads));
        }
        Ok(())
    }

    pub fn worker_name(&self, worker: usize) -> String {
        format!("{}-{}", self.thread_name_prefix, worker)
    }
}

impl Default for MRParameters {
    fn default() -> MRParameters {
        MRParameters::new()
    }
}
