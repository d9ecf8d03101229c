//! Iteration over pages of one representation.

use std::sync::Arc;

/// Iterator over shared pages.
///
/// The in-memory container always holds a single page per representation.
#[derive(Debug)]
pub struct BatchSet<T> {
    pages: std::vec::IntoIter<Arc<T>>,
}

impl<T> BatchSet<T> {
    /// Batch set yielding exactly `page`.
    pub fn single(page: Arc<T>) -> Self {
        BatchSet {
            pages: vec![page].into_iter(),
        }
    }

    /// The first page, if any, without consuming the rest.
    pub fn first(&self) -> Option<&Arc<T>> {
        self.pages.as_slice().first()
    }
}

impl<T> Iterator for BatchSet<T> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Arc<T>> {
        self.pages.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pages.size_hint()
    }
}

impl<T> ExactSizeIterator for BatchSet<T> {}
