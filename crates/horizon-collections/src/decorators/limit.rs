//! Caps how many matching items are visible.

use crate::change::CollectionChange;
use crate::decorator::{ChangeSink, CollectionDecorator, IndexQuery, Item, DEFAULT_PRIORITY};

use super::mask::rank;
use super::ItemFilter;

/// Shows at most `limit` items that satisfy the condition.
///
/// Items that fail the condition always pass through. Matching items are
/// counted in upstream order and the ones past the limit are hidden; when a
/// visible match goes away, the first hidden one moves up, and when a match
/// arrives inside the limit, the last visible match is pushed out.
///
/// A running count of matches decides whether anything is hidden at all, so
/// each event promotes or demotes at most one other item.
pub struct LimitDecorator<T> {
    limit: Option<usize>,
    condition: ItemFilter<T>,
    matches: Vec<bool>,
    visible: Vec<bool>,
    matching: usize,
    priority: i32,
}

impl<T: Item> LimitDecorator<T> {
    /// Limit every item.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            condition: ItemFilter::All,
            matches: Vec::new(),
            visible: Vec::new(),
            matching: 0,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Limit only the items the predicate accepts.
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.condition = ItemFilter::new(condition);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn condition(&self) -> &ItemFilter<T> {
        &self.condition
    }

    pub fn set_condition(&mut self, condition: ItemFilter<T>) {
        self.condition = condition;
    }

    /// Number of upstream items satisfying the condition, visible or not.
    pub fn matching_count(&self) -> usize {
        self.matching
    }

    /// Whether a match preceded by `before` other matches is shown.
    fn admits(&self, before: usize) -> bool {
        self.limit.is_none_or(|limit| before < limit)
    }



    fn matches_before(&self, index: usize) -> usize {
        self.matches[..index].iter().filter(|m| **m).count()
    }

    /// Show the first hidden match at or after `from`.
    fn promote(&mut self, upstream: &[T], from: usize, sink: &mut ChangeSink<T>) {
        let hidden = (from..self.matches.len()).find(|&j| self.matches[j] && !self.visible[j]);
        if let Some(j) = hidden {
            self.visible[j] = true;
            sink.add(rank(&self.visible, j), upstream[j].clone());
        }
    }

    /// Hide the visible match that follows `allowed` more visible matches
    /// from `from` on.
    fn demote(
        &mut self,
        upstream: &[T],
        from: usize,
        mut allowed: usize,
        sink: &mut ChangeSink<T>,
    ) {
        for j in from..self.matches.len() {
            if !(self.matches[j] && self.visible[j]) {
                continue;
            }
            if allowed == 0 {
                sink.remove(rank(&self.visible, j), upstream[j].clone());
                self.visible[j] = false;
                return;
            }
            allowed -= 1;
        }
    }

    /// A match was admitted at `index` behind `before` matches; push the last
    /// visible match out if that overfills the limit.
    fn make_room(&mut self, upstream: &[T], index: usize, before: usize, sink: &mut ChangeSink<T>) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.matching > limit {
            self.demote(upstream, index + 1, limit - before - 1, sink);
        }
    }

    /// Re-evaluate the slot at `index` after its item changed. `on_kept`
    /// handles the case where the slot stays visible.
    fn reevaluate(
        &mut self,
        upstream: &[T],
        index: usize,
        old_item: &T,
        sink: &mut ChangeSink<T>,
        on_kept: impl FnOnce(usize, &mut ChangeSink<T>),
    ) {
        let was_match = self.matches[index];
        let was_visible = self.visible[index];
        let matching = self.condition.matches(&upstream[index]);
        self.matches[index] = matching;

        match (was_match, matching) {
            (false, false) | (true, true) => {
                if was_visible {
                    on_kept(rank(&self.visible, index), sink);
                }
            }
            (true, false) => {
                self.matching -= 1;
                self.visible[index] = true;
                if was_visible {
                    on_kept(rank(&self.visible, index), sink);
                    self.promote(upstream, index + 1, sink);
                } else {
                    sink.add(rank(&self.visible, index), upstream[index].clone());
                }
            }
            (false, true) => {
                self.matching += 1;
                let before = self.matches_before(index);
                if self.admits(before) {
                    on_kept(rank(&self.visible, index), sink);
                    self.make_room(upstream, index, before, sink);
                } else {
                    sink.remove(rank(&self.visible, index), old_item.clone());
                    self.visible[index] = false;
                }
            }
        }
    }
}

impl<T: Item> CollectionDecorator<T> for LimitDecorator<T> {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn decorate(&mut self, upstream: &[T]) -> Vec<T> {
        self.matches = upstream.iter().map(|item| self.condition.matches(item)).collect();
        self.matching = 0;
        self.visible = Vec::with_capacity(upstream.len());
        for &matching in &self.matches {
            if matching {
                let shown = self.limit.is_none_or(|limit| self.matching < limit);
                self.matching += 1;
                self.visible.push(shown);
            } else {
                self.visible.push(true);
            }
        }
        upstream
            .iter()
            .zip(&self.visible)
            .filter(|(_, visible)| **visible)
            .map(|(item, _)| item.clone())
            .collect()
    }

    fn on_changed(
        &mut self,
        upstream: &[T],
        change: &CollectionChange<T>,
        sink: &mut ChangeSink<T>,
    ) {
        match change {
            CollectionChange::Add { index, item } => {
                let matching = self.condition.matches(item);
                self.matches.insert(*index, matching);
                self.visible.insert(*index, false);
                if !matching {
                    self.visible[*index] = true;
                    sink.add(rank(&self.visible, *index), item.clone());
                    return;
                }
                self.matching += 1;
                let before = self.matches_before(*index);
                if self.admits(before) {
                    self.visible[*index] = true;
                    sink.add(rank(&self.visible, *index), item.clone());
                    self.make_room(upstream, *index, before, sink);
                }
            }
            CollectionChange::Remove { index, item } => {
                let was_match = self.matches.remove(*index);
                let was_visible = self.visible[*index];
                if was_visible {
                    sink.remove(rank(&self.visible, *index), item.clone());
                }
                self.visible.remove(*index);
                if was_match {
                    self.matching -= 1;
                    if was_visible {
                        self.promote(upstream, *index, sink);
                    }
                }
            }
            CollectionChange::Replace {
                index,
                old_item,
                new_item,
            } => {
                self.reevaluate(upstream, *index, old_item, sink, |r, sink| {
                    sink.replace(r, old_item.clone(), new_item.clone())
                });
            }
            CollectionChange::Move {
                old_index,
                new_index,
                item,
            } => {
                let was_visible = self.visible[*old_index];
                let old_rank = rank(&self.visible, *old_index);
                let matching = self.matches.remove(*old_index);
                self.matches.insert(*new_index, matching);
                self.visible.remove(*old_index);
                self.visible.insert(*new_index, was_visible);

                let admitted = !matching || self.admits(self.matches_before(*new_index));
                match (was_visible, admitted) {
                    (true, true) => {
                        sink.move_item(old_rank, rank(&self.visible, *new_index), item.clone());
                    }
                    (true, false) => {
                        // Moved behind the cutoff; the next match takes its place.
                        sink.remove(old_rank, item.clone());
                        self.visible[*new_index] = false;
                        self.promote(upstream, *old_index, sink);
                    }
                    (false, true) => {
                        self.visible[*new_index] = true;
                        sink.add(rank(&self.visible, *new_index), item.clone());
                        let before = self.matches_before(*new_index);
                        if let Some(limit) = self.limit {
                            self.demote(upstream, new_index + 1, limit - before - 1, sink);
                        }
                    }
                    (false, false) => {}
                }
            }
            CollectionChange::ItemChanged { index, item, args } => {
                self.reevaluate(upstream, *index, item, sink, |r, sink| {
                    sink.item_changed(r, item.clone(), args.clone())
                });
            }
            CollectionChange::Reset { .. } => {}
        }
    }

    fn try_get_indexes(&self, query: &IndexQuery<'_, T>, indexes: &mut Vec<usize>) {
        for upstream_index in query.upstream_indexes() {
            if self.visible.get(upstream_index).copied().unwrap_or(false) {
                indexes.push(rank(&self.visible, upstream_index));
                if query.ignore_duplicates() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn replay(
        limit: &mut LimitDecorator<i32>,
        output: &mut Vec<i32>,
        upstream: &[i32],
        change: CollectionChange<i32>,
    ) {
        let mut sink = ChangeSink::new();
        limit.on_changed(upstream, &change, &mut sink);
        for event in sink.into_events() {
            event.apply_to(output).unwrap();
        }
        let mut fresh = LimitDecorator::new(limit.limit());
        fresh.set_condition(limit.condition().clone());
        assert_eq!(*output, fresh.decorate(upstream), "after {change:?}");
    }

    #[test]
    fn test_caps_visible_items() {
        let mut limit = LimitDecorator::new(Some(2));
        assert_eq!(limit.decorate(&[5, 6, 7]), vec![5, 6]);

        let mut unlimited = LimitDecorator::new(None);
        assert_eq!(unlimited.decorate(&[5, 6, 7]), vec![5, 6, 7]);
    }

    #[test]
    fn test_condition_only_counts_matches() {
        let mut limit = LimitDecorator::new(Some(1)).with_condition(|n: &i32| n % 2 == 0);
        assert_eq!(limit.decorate(&[1, 2, 3, 4, 5]), vec![1, 2, 3, 5]);
        assert_eq!(limit.matching_count(), 2);
    }

    #[test]
    fn test_remove_promotes_next() {
        let mut limit = LimitDecorator::new(Some(2));
        let mut upstream = vec![1, 2, 3];
        let mut output = limit.decorate(&upstream);

        upstream.remove(0);
        let mut sink = ChangeSink::new();
        limit.on_changed(&upstream, &CollectionChange::Remove { index: 0, item: 1 }, &mut sink);
        assert_eq!(
            sink.events(),
            &[
                CollectionChange::Remove { index: 0, item: 1 },
                CollectionChange::Add { index: 1, item: 3 },
            ]
        );
        for event in sink.into_events() {
            event.apply_to(&mut output).unwrap();
        }
        assert_eq!(output, vec![2, 3]);
    }

    #[test]
    fn test_insert_before_cutoff_pushes_last_out() {
        let mut limit = LimitDecorator::new(Some(2));
        let mut upstream = vec![1, 2, 3];
        let mut output = limit.decorate(&upstream);

        upstream.insert(0, 0);
        replay(&mut limit, &mut output, &upstream, CollectionChange::Add { index: 0, item: 0 });
        assert_eq!(output, vec![0, 1]);
    }

    #[test]
    fn test_changes_across_condition() {
        let mut limit = LimitDecorator::new(Some(1)).with_condition(|n: &i32| *n > 10);
        let mut upstream = vec![11, 12, 1];
        let mut output = limit.decorate(&upstream);
        assert_eq!(output, vec![11, 1]);

        upstream[0] = 2;
        replay(
            &mut limit,
            &mut output,
            &upstream,
            CollectionChange::ItemChanged { index: 0, item: 2, args: None },
        );
        assert_eq!(output, vec![2, 12, 1]);

        upstream[2] = 13;
        replay(
            &mut limit,
            &mut output,
            &upstream,
            CollectionChange::Replace { index: 2, old_item: 1, new_item: 13 },
        );
        assert_eq!(output, vec![2, 12]);
    }

    #[test]
    fn test_move_across_cutoff() {
        let mut limit = LimitDecorator::new(Some(2));
        let mut upstream = vec![1, 2, 3, 4];
        let mut output = limit.decorate(&upstream);

        let item = upstream.remove(3);
        upstream.insert(0, item);
        replay(
            &mut limit,
            &mut output,
            &upstream,
            CollectionChange::Move { old_index: 3, new_index: 0, item: 4 },
        );
        assert_eq!(output, vec![4, 1]);

        let item = upstream.remove(0);
        upstream.insert(1, item);
        let mut sink = ChangeSink::new();
        limit.on_changed(
            &upstream,
            &CollectionChange::Move { old_index: 0, new_index: 1, item: 4 },
            &mut sink,
        );
        assert_eq!(
            sink.events(),
            &[CollectionChange::Move { old_index: 0, new_index: 1, item: 4 }]
        );
    }

    #[test]
    fn test_each_event_touches_at_most_one_neighbour() {
        let mut limit = LimitDecorator::new(Some(3)).with_condition(|n: &i32| n % 3 != 0);
        let mut rng = StdRng::seed_from_u64(7);
        let mut upstream: Vec<i32> = (0..8).collect();
        let mut output = limit.decorate(&upstream);

        for _ in 0..400 {
            let len = upstream.len();
            let change = match rng.gen_range(0..5) {
                0 | 1 => {
                    let index = rng.gen_range(0..=len);
                    let item = rng.gen_range(0..30);
                    upstream.insert(index, item);
                    CollectionChange::Add { index, item }
                }
                2 if len > 0 => {
                    let index = rng.gen_range(0..len);
                    CollectionChange::Remove { index, item: upstream.remove(index) }
                }
                3 if len > 0 => {
                    let index = rng.gen_range(0..len);
                    let new_item = rng.gen_range(0..30);
                    let old_item = std::mem::replace(&mut upstream[index], new_item);
                    CollectionChange::Replace { index, old_item, new_item }
                }
                4 if len > 1 => {
                    let old_index = rng.gen_range(0..len);
                    let new_index = rng.gen_range(0..len);
                    let item = upstream.remove(old_index);
                    upstream.insert(new_index, item);
                    CollectionChange::Move { old_index, new_index, item }
                }
                _ => continue,
            };

            let mut sink = ChangeSink::new();
            limit.on_changed(&upstream, &change, &mut sink);
            assert!(sink.events().len() <= 2, "{change:?} produced {:?}", sink.events());
            for event in sink.into_events() {
                event.apply_to(&mut output).unwrap();
            }
            let mut fresh = LimitDecorator::new(Some(3)).with_condition(|n: &i32| n % 3 != 0);
            assert_eq!(output, fresh.decorate(&upstream), "after {change:?}");
            assert_eq!(limit.matching_count(), fresh.matching_count());
        }
    }
}
