//! Sorted arrays of upstream positions.
//!
//! The key of upstream slot `i` is `(item[i], i)` under the comparer, so equal
//! items keep their upstream order and no two keys are ever equal.

use std::cmp::Ordering;

use super::Comparer;

fn key_cmp<T: 'static>(comparer: &Comparer<T>, upstream: &[T], a: usize, b: usize) -> Ordering {
    comparer.compare(&upstream[a], &upstream[b]).then(a.cmp(&b))
}

/// Output position to upstream position, kept sorted by key.
#[derive(Debug, Clone, Default)]
pub(crate) struct SortedIndex {
    order: Vec<usize>,
}

impl SortedIndex {
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Rebuild from the given upstream members.
    pub(crate) fn rebuild<T: 'static>(
        &mut self,
        upstream: &[T],
        comparer: &Comparer<T>,
        members: impl IntoIterator<Item = usize>,
    ) {
        self.order = members.into_iter().collect();
        self.order.sort_by(|&a, &b| key_cmp(comparer, upstream, a, b));
    }

    /// The order a full stable sort would produce right now.
    pub(crate) fn sorted<T: 'static>(&self, upstream: &[T], comparer: &Comparer<T>) -> Vec<usize> {
        let mut order = self.order.clone();
        order.sort_by(|&a, &b| key_cmp(comparer, upstream, a, b));
        order
    }

    pub(crate) fn set_order(&mut self, order: Vec<usize>) {
        self.order = order;
    }

    pub(crate) fn position_of(&self, upstream_index: usize) -> Option<usize> {
        self.order.iter().position(|&o| o == upstream_index)
    }

    /// An upstream slot was inserted at `index`.
    pub(crate) fn shift_inserted(&mut self, index: usize) {
        for o in &mut self.order {
            if *o >= index {
                *o += 1;
            }
        }
    }

    /// An upstream slot was removed at `index`; it must no longer be a member.
    pub(crate) fn shift_removed(&mut self, index: usize) {
        for o in &mut self.order {
            if *o > index {
                *o -= 1;
            }
        }
    }

    /// An upstream slot moved from `old` to `new`.
    pub(crate) fn shift_moved(&mut self, old: usize, new: usize) {
        for o in &mut self.order {
            *o = moved_index(*o, old, new);
        }
    }

    /// Insert a member at its sorted position and return that position.
    pub(crate) fn insert<T: 'static>(
        &mut self,
        upstream: &[T],
        comparer: &Comparer<T>,
        index: usize,
    ) -> usize {
        let pos = self
            .order
            .partition_point(|&o| key_cmp(comparer, upstream, o, index) == Ordering::Less);
        self.order.insert(pos, index);
        pos
    }

    /// Remove a member, returning the position it had.
    pub(crate) fn remove(&mut self, index: usize) -> Option<usize> {
        let pos = self.position_of(index)?;
        self.order.remove(pos);
        Some(pos)
    }

    /// Whether the member at `pos` is ordered against both neighbours.
    pub(crate) fn fits_at<T: 'static>(
        &self,
        upstream: &[T],
        comparer: &Comparer<T>,
        pos: usize,
    ) -> bool {
        let index = self.order[pos];
        let after_prev = pos == 0
            || key_cmp(comparer, upstream, self.order[pos - 1], index) == Ordering::Less;
        let before_next = pos + 1 >= self.order.len()
            || key_cmp(comparer, upstream, index, self.order[pos + 1]) == Ordering::Less;
        after_prev && before_next
    }

    /// Whether every member other than the one at `skip` is in order.
    pub(crate) fn is_sorted_except<T: 'static>(
        &self,
        upstream: &[T],
        comparer: &Comparer<T>,
        skip: usize,
    ) -> bool {
        let mut rest = self
            .order
            .iter()
            .enumerate()
            .filter(|&(pos, _)| pos != skip)
            .map(|(_, &o)| o);
        let Some(mut prev) = rest.next() else {
            return true;
        };
        for o in rest {
            if key_cmp(comparer, upstream, prev, o) != Ordering::Less {
                return false;
            }
            prev = o;
        }
        true
    }
}

/// Where upstream slot `index` ends up after a move from `old` to `new`.
pub(crate) fn moved_index(index: usize, old: usize, new: usize) -> usize {
    if index == old {
        new
    } else if old < new && index > old && index <= new {
        index - 1
    } else if new < old && index >= new && index < old {
        index + 1
    } else {
        index
    }
}
