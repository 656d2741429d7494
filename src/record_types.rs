//! Records, groups of records and the emitters used by map() and reduce().

use std::vec;

/// A (key,value) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Record<K, V> {
    pub fn new(key: K, value: V) -> Record<K, V> {
        Record { key, value }
    }
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Record<K, V> {
    fn from((key, value): (K, V)) -> Record<K, V> {
        Record { key, value }
    }
}

/// A (key,[value]) pair; the input to a reducer function. All values were emitted under keys
/// equivalent to `key` (neither compares less than the other); `key` is the first of them.
/// Never empty. Can be easily iterated over, e.g. in a `for` loop.
#[derive(Debug)]
pub struct MultiRecord<K, V> {
    key: K,
    values: Vec<V>,
}

impl<K, V> MultiRecord<K, V> {
    pub fn new(key: K, values: Vec<V>) -> MultiRecord<K, V> {
        debug_assert!(!values.is_empty());
        MultiRecord { key, values }
    }
    /// Retrieves the key of the record.
    pub fn key(&self) -> &K {
        &self.key
    }
    pub fn values(&self) -> &[V] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn into_parts(self) -> (K, Vec<V>) {
        (self.key, self.values)
    }
}

impl<K, V> IntoIterator for MultiRecord<K, V> {
    type Item = V;
    type IntoIter = vec::IntoIter<V>;
    /// Allows iterating over all the values.
    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Emitter type used in the mapper phase; used to emit (key,value) pairs.
/// Every worker owns one; nothing else touches it until the shuffle.
pub struct MEmitter<K, V> {
    r: Vec<Record<K, V>>,
}

impl<K, V> MEmitter<K, V> {
    pub fn new() -> MEmitter<K, V> {
        MEmitter { r: Vec::new() }
    }
    pub fn emit(&mut self, key: K, val: V) {
        self.r.push(Record { key, value: val })
    }
    pub fn len(&self) -> usize {
        self.r.len()
    }
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
    pub fn _get(self) -> Vec<Record<K, V>> {
        self.r
    }
}

impl<K, V> Default for MEmitter<K, V> {
    fn default() -> Self {
        MEmitter::new()
    }
}

/// Emitter used in the reducer phase; used to emit (key,value) pairs.
/// Results are buffered per group and appended to the job's sink in one go.
pub struct REmitter<K, V> {
    r: Vec<Record<K, V>>,
}

impl<K, V> REmitter<K, V> {
    pub fn new() -> REmitter<K, V> {
        REmitter { r: Vec::new() }
    }
    pub fn emit(&mut self, key: K, val: V) {
        self.r.push(Record { key, value: val })
    }
    pub fn len(&self) -> usize {
        self.r.len()
    }
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
    pub fn _get(self) -> Vec<Record<K, V>> {
        self.r
    }
}

impl<K, V> Default for REmitter<K, V> {
    fn default() -> Self {
        REmitter::new()
    }
}

/// A type implementing OutputSink receives the output of the reduce phase. The job holds it
/// behind a lock, so appends from different workers never interleave within one group's
/// output. Existing contents are never touched.
pub trait OutputSink<K, V>: Send {
    fn append(&mut self, key: K, value: V);
}

impl<K: Send, V: Send> OutputSink<K, V> for Vec<Record<K, V>> {
    fn append(&mut self, key: K, value: V) {
        self.push(Record { key, value })
    }
}

impl<K: Send, V: Send> OutputSink<K, V> for Vec<(K, V)> {
    fn append(&mut self, key: K, value: V) {
        self.push((key, value))
    }
}
