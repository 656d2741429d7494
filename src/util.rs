use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::record_types::Record;

/// Transforms an iterator<V> into an iterator<Record<u64, V>>. It yields
/// records with the key being the position of the current record, starting with
/// 1. Mainly used to build map input from sources that only yield values (no keys).
pub struct PosRecordIterator<I> {
    i: I,
    counter: u64,
}

impl<I> PosRecordIterator<I> {
    pub fn new(it: I) -> PosRecordIterator<I> {
        PosRecordIterator { i: it, counter: 0 }
    }
}

impl<V, I: Iterator<Item = V>> Iterator for PosRecordIterator<I> {
    type Item = Record<u64, V>;
    fn next(&mut self) -> Option<Self::Item> {
        let val = self.i.next()?;
        self.counter += 1;
        Some(Record {
            key: self.counter,
            value: val,
        })
    }
}

/// Locks a mutex shared between workers. A worker that panicked while holding one of them has
/// already marked the job as abandoned, so the data behind a poisoned lock is only read to
/// shut down.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn wait<'a, T>(cv: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}
