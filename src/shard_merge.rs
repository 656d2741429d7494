//! Implements a merge tree to merge an arbitrary number of sorted worker outputs.
//! Genericized in order to build arbitrary merge trees over any item type and ordering.

use std::iter::{self, Peekable};

type Source<'a, T> = Peekable<Box<dyn Iterator<Item = T> + 'a>>;

/// See module description.
/// This type uses dynamic instead of static dispatch because it realizes an arbitrary structure
/// and can therefore not work with a single type signature.
///
/// On ties the left input wins, so merging is stable with respect to the order of the sources.
pub struct ShardMergeIterator<'a, T> {
    left: Source<'a, T>,
    right: Source<'a, T>,
    less: &'a dyn Fn(&T, &T) -> bool,
}

impl<'a, T> Iterator for ShardMergeIterator<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        let take_right = match (self.left.peek(), self.right.peek()) {
            (Some(l), Some(r)) => (self.less)(r, l),
            (None, _) => true,
            (Some(_), None) => false,
        };
        if take_right {
            self.right.next()
        } else {
            self.left.next()
        }
    }
}

impl<'a, T: 'a> ShardMergeIterator<'a, T> {
    fn node<L, R>(left: L, right: R, less: &'a dyn Fn(&T, &T) -> bool) -> ShardMergeIterator<'a, T>
        where L: Iterator<Item = T> + 'a,
              R: Iterator<Item = T> + 'a
    {
        let left: Box<dyn Iterator<Item = T> + 'a> = Box::new(left);
        let right: Box<dyn Iterator<Item = T> + 'a> = Box::new(right);
        ShardMergeIterator {
            left: left.peekable(),
            right: right.peekable(),
            less,
        }
    }

    /// Takes multiple sorted sources and generates one ShardMergeIterator yielding all their
    /// items in sorted order (yes, iterator over a collection of iterators).
    pub fn build<It, ItIt>(sources: ItIt, less: &'a dyn Fn(&T, &T) -> bool) -> ShardMergeIterator<'a, T>
        where It: Iterator<Item = T> + 'a,
              ItIt: IntoIterator<Item = It>
    {
        let mut merged: Vec<ShardMergeIterator<'a, T>> = Vec::new();
        let mut sources = sources.into_iter();

        // Initial merging: Merge pairs of input iterators together.
        while let Some(src1) = sources.next() {
            match sources.next() {
                None => merged.push(ShardMergeIterator::node(src1, iter::empty(), less)),
                Some(src2) => merged.push(ShardMergeIterator::node(src1, src2, less)),
            }
        }

        // Recursively build the merge tree from the leaves.
        ShardMergeIterator::merge(merged, less)
    }

    /// Merge multiple ShardMergeIterators, recursively (meaning it will result in a more or less
    /// balanced merge sort tree).
    fn merge(mut its: Vec<ShardMergeIterator<'a, T>>, less: &'a dyn Fn(&T, &T) -> bool) -> ShardMergeIterator<'a, T> {
        match its.len() {
            0 => ShardMergeIterator::node(iter::empty(), iter::empty(), less),
            1 => its.remove(0),
            2 => {
                let it2 = its.remove(1);
                let it1 = its.remove(0);
                ShardMergeIterator::node(it1, it2, less)
            }
            n => {
                // its is left part, right is right part
                let right = its.split_off(n / 2);
                ShardMergeIterator::node(ShardMergeIterator::merge(its, less),
                                         ShardMergeIterator::merge(right, less),
                                         less)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShardMergeIterator;
    use std::vec;

    fn get_collection_1() -> vec::IntoIter<i32> {
        vec![1, 4, 5, 5, 6, 9, 11, 15, 15, 17, 18, 20].into_iter()
    }
    fn get_collection_2() -> vec::IntoIter<i32> {
        vec![2, 2, 2, 3, 4, 5, 7, 8, 9, 10, 45, 46, 47].into_iter()
    }
    fn get_collection_3() -> vec::IntoIter<i32> {
        vec![5, 8, 9, 10, 22, 25, 30, 37, 41, 46, 71].into_iter()
    }
    fn get_collection_4() -> vec::IntoIter<i32> {
        vec![111, 112, 113, 155].into_iter()
    }
    fn get_collection_5() -> vec::IntoIter<i32> {
        vec![13, 45, 98, 105, 145].into_iter()
    }
    fn get_collection_6() -> vec::IntoIter<i32> {
        vec![14, 67, 99, 111, 222, 566, 643].into_iter()
    }

    fn less(a: &i32, b: &i32) -> bool {
        a < b
    }

    #[test]
    fn test_merge_iterator() {
        let it = ShardMergeIterator::build(vec![get_collection_1(),
                                                get_collection_2(),
                                                get_collection_3(),
                                                get_collection_4(),
                                                get_collection_5(),
                                                get_collection_6()],
                                           &less);
        let mut cmp = 0;
        let mut cnt = 0;

        for i in it {
            assert!(i >= cmp);
            cmp = i;
            cnt += 1;
        }

        assert_eq!(cnt,
                   get_collection_1().len() + get_collection_2().len() + get_collection_3().len() +
                   get_collection_4().len() + get_collection_5().len() +
                   get_collection_6().len());
    }

    #[test]
    fn test_merge_empty_and_single() {
        let none: Vec<vec::IntoIter<i32>> = Vec::new();
        assert_eq!(ShardMergeIterator::build(none, &less).count(), 0);

        let one = vec![get_collection_4()];
        let out: Vec<i32> = ShardMergeIterator::build(one, &less).collect();
        assert_eq!(out, vec![111, 112, 113, 155]);

        let with_empty = vec![Vec::new().into_iter(), vec![1, 3].into_iter(), Vec::new().into_iter()];
        let out: Vec<i32> = ShardMergeIterator::build(with_empty, &less).collect();
        assert_eq!(out, vec![1, 3]);
    }

    #[test]
    fn test_merge_is_stable() {
        // Compare by tens only; ties must come out in source order.
        let tens = |a: &(i32, char), b: &(i32, char)| a.0 / 10 < b.0 / 10;
        let sources = vec![vec![(10, 'a'), (20, 'b')].into_iter(),
                           vec![(11, 'c'), (21, 'd')].into_iter(),
                           vec![(12, 'e')].into_iter()];
        let out: String = ShardMergeIterator::build(sources, &tens).map(|(_, c)| c).collect();
        assert_eq!(out, "acebd");
    }
}
