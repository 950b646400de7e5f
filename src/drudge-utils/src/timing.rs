//! Measuring how long iterators take to produce their items.

use std::time::{Duration, Instant};

/// An iterator yielding every item of `I` together with the time it
/// took to produce it.
///
/// Created by [`timed`].
#[derive(Clone, Debug)]
pub struct Timed<I> {
    iter: I,
}

/// Wraps `iter` to measure the production time of each item.
///
/// Useful on lazy pool streams, where the duration covers waiting for
/// the next completed job.
pub fn timed<I: IntoIterator>(iter: I) -> Timed<I::IntoIter> {
    Timed {
        iter: iter.into_iter(),
    }
}

impl<I: Iterator> Iterator for Timed<I> {
    type Item = (I::Item, Duration);

    fn next(&mut self) -> Option<Self::Item> {
        let start = Instant::now();
        let item = self.iter.next()?;

        Some((item, start.elapsed()))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
