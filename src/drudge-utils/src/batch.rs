//! Grouping of item streams into fixed-size batches.

use std::num::NonZeroUsize;

/// An iterator that groups the items of another iterator into
/// vectors of a fixed size.
///
/// Created by [`batches`]. The last batch holds the remainder and may
/// be shorter; an empty input produces no batches at all.
#[derive(Clone, Debug)]
pub struct Batches<I> {
    iter: I,
    size: NonZeroUsize,
}

/// Lazily splits `iter` into batches of `size` items.
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use drudge_utils::batch::batches;
///
/// let size = NonZeroUsize::new(2).unwrap();
/// let out: Vec<_> = batches(1..=5, size).collect();
///
/// assert_eq!(out, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// ```
pub fn batches<I: IntoIterator>(iter: I, size: NonZeroUsize) -> Batches<I::IntoIter> {
    Batches {
        iter: iter.into_iter(),
        size,
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.size.get());
        batch.extend(self.iter.by_ref().take(self.size.get()));

        (!batch.is_empty()).then_some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.iter.size_hint();
        let size = self.size.get();

        (lower.div_ceil(size), upper.map(|u| u.div_ceil(size)))
    }
}

/// Applies `f` to every batch of `iter` and flattens the outputs.
pub fn process_batchwise<I, F, O>(
    f: F,
    iter: I,
    size: NonZeroUsize,
) -> impl Iterator<Item = O::Item>
where
    I: IntoIterator,
    F: FnMut(Vec<I::Item>) -> O,
    O: IntoIterator,
{
    batches(iter, size).flat_map(f)
}

/// Feeds every batch of `iter` into `f`.
pub fn consume_batchwise<I, F>(f: F, iter: I, size: NonZeroUsize)
where
    I: IntoIterator,
    F: FnMut(Vec<I::Item>),
{
    batches(iter, size).for_each(f);
}
