//! Sorting/comparison functions of various sorts.
//!
//! The engine only ever needs a strict weak ordering ("less than") on intermediate keys.
//! Equality is derived from it: two keys are equal if neither is less than the other.

use std::cmp::{Ord, Ordering};

use crate::record_types::Record;

/// Function type to be used as custom key ordering: returns true iff a < b.
/// (rust's standard String comparison is based on ASCII values, not dictionary order)
pub type Comparer<T> = fn(a: &T, b: &T) -> bool;

/// Comparer<T: Ord>
#[inline]
pub fn default_less<T: Ord>(a: &T, b: &T) -> bool {
    a.cmp(b) == Ordering::Less
}

/// Turns a strict weak ordering into a total Ordering usable by the std sorting functions.
#[inline]
pub fn ordering_from_less<T, F: Fn(&T, &T) -> bool>(less: &F, a: &T, b: &T) -> Ordering {
    if less(a, b) {
        Ordering::Less
    } else if less(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Key equality as derived from the ordering.
#[inline]
pub fn keys_equal<T, F: Fn(&T, &T) -> bool>(less: &F, a: &T, b: &T) -> bool {
    !less(a, b) && !less(b, a)
}

/// Sorts a worker's intermediate buffer by key. The sort is stable, so records with equal
/// keys stay in emission order.
pub fn sort_records<K, V, F: Fn(&K, &K) -> bool>(records: &mut [Record<K, V>], less: &F) {
    records.sort_by(|a, b| ordering_from_less(less, &a.key, &b.key));
}

/// Compares a with b in a totally case insensitive manner
/// (like coreutil sort). Keys differing only in case end up in the same group.
#[inline]
pub fn dict_string_less(a: &String, b: &String) -> bool {
    let (mut charsa, mut charsb) = (a.chars(), b.chars());
    loop {
        match (charsa.next(), charsb.next()) {
            (None, None) => return false,
            (_, None) => return false,
            (None, _) => return true,
            (Some(ca), Some(cb)) => match dict_char_compare(ca, cb) {
                Ordering::Equal => continue,
                o => return o == Ordering::Less,
            },
        }
    }
}

#[inline]
fn dict_char_compare(a: char, b: char) -> Ordering {
    // denormalize case to lower case
    a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
}
