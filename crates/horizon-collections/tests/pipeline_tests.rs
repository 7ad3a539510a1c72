//! Integration tests for decorator chains.
//!
//! Every test drives a list through its public API and checks the decorated
//! view both directly and through a mirror that only sees change events.

mod common;

use std::collections::HashSet;

use common::{init_tracing, Mirror};
use horizon_collections::decorators::{
    Comparer, ConvertDecorator, DistinctDecorator, FilterDecorator, FirstLastTrackerDecorator,
    GroupDecorator, GroupHeaderDecorator, HeaderFooterDecorator, ItemHeaderFooterDecorator,
    ItemPlacement, LimitDecorator, SortDecorator, SortingDecorator, TrackPosition, TrackerDecorator,
};
use horizon_collections::{CollectionChange, ObservableList};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_filter_then_sort_descending() {
    init_tracing();
    let list = ObservableList::from_vec(vec![1, 2, 3, 4]);
    list.add_decorator(FilterDecorator::new(|n: &i32| n % 2 == 0)).unwrap();
    list.add_decorator(SortingDecorator::new(Comparer::<i32>::descending())).unwrap();
    let mirror = Mirror::attach(&list);
    assert_eq!(list.decorated_items(), vec![4, 2]);

    list.remove(&2).unwrap();
    assert_eq!(list.decorated_items(), vec![4]);
    assert_eq!(
        mirror.events(),
        vec![CollectionChange::Remove { index: 1, item: 2 }]
    );

    list.push(6).unwrap();
    assert_eq!(list.decorated_items(), vec![6, 4]);
    mirror.assert_synced(&list);
}

#[test]
fn test_distinct_by_remainder() {
    let list = ObservableList::from_vec(vec![1, 2, 3, 4, 5, 6]);
    list.add_decorator(DistinctDecorator::new(|n: &i32| n % 3)).unwrap();
    let mirror = Mirror::attach(&list);
    assert_eq!(list.decorated_items(), vec![1, 2, 3]);

    list.remove(&2).unwrap();
    assert_eq!(list.decorated_items(), vec![1, 3, 5]);
    mirror.assert_synced(&list);
}

#[test]
fn test_odd_items_hidden_then_revealed() {
    let list = ObservableList::from_vec(vec![2, 4]);
    list.add_decorator(FilterDecorator::new(|n: &i32| n % 2 == 0)).unwrap();
    let mirror = Mirror::attach(&list);

    list.insert(1, 3).unwrap();
    assert!(mirror.events().is_empty());

    list.update_item(1, None, |n| *n = 8).unwrap();
    assert_eq!(mirror.events(), vec![CollectionChange::Add { index: 1, item: 8 }]);
    assert_eq!(list.try_get_indexes(&8, false), vec![1]);
}

#[test]
fn test_filter_twice_is_filter_once() {
    let once = ObservableList::from_vec((0..12).collect());
    once.add_decorator(FilterDecorator::new(|n: &i32| n % 3 != 0)).unwrap();

    let twice = ObservableList::from_vec((0..12).collect());
    twice.add_decorator(FilterDecorator::new(|n: &i32| n % 3 != 0)).unwrap();
    twice.add_decorator(FilterDecorator::new(|n: &i32| n % 3 != 0)).unwrap();

    for list in [&once, &twice] {
        list.remove_at(4).unwrap();
        list.move_item(0, 7).unwrap();
        list.insert(2, 13).unwrap();
    }
    assert_eq!(once.decorated_items(), twice.decorated_items());
}

#[test]
fn test_priority_orders_stages() {
    let list = ObservableList::from_vec(vec![5, 1, 4, 2, 3]);
    list.add_decorator(LimitDecorator::new(Some(2)).with_priority(10)).unwrap();
    list.add_decorator(SortDecorator::new(Comparer::natural()).with_priority(-10)).unwrap();
    assert_eq!(list.decorated_items(), vec![1, 2]);

    list.push(0).unwrap();
    assert_eq!(list.decorated_items(), vec![0, 1]);
}

#[test]
fn test_headers_footers_around_groups() {
    let list = ObservableList::from_vec(vec![3, 14, 5]);
    list.add_decorator(GroupDecorator::new(|n: &i32| Some(n / 10), |key: &i32| -(key + 1)))
        .unwrap();
    list.add_decorator(HeaderFooterDecorator::new(vec![100], vec![200])).unwrap();
    let mirror = Mirror::attach(&list);
    assert_eq!(list.decorated_items(), vec![100, -1, -2, 3, 14, 5, 200]);

    list.remove(&14).unwrap();
    assert_eq!(list.decorated_items(), vec![100, -1, 3, 5, 200]);
    mirror.assert_synced(&list);
}

#[test]
fn test_tracker_sees_converted_values() {
    let tracker = TrackerDecorator::new(
        |n: &i32| *n,
        0i64,
        |sum, n, _| *sum += i64::from(*n),
        |sum, n, _| *sum -= i64::from(*n),
    );
    let sum = tracker.state();

    let list = ObservableList::from_vec(vec![1, 2]);
    list.add_decorator(ConvertDecorator::new(|n: &i32, _previous: Option<&i32>| n * 10)).unwrap();
    list.add_decorator(tracker).unwrap();
    assert_eq!(sum.get(), 30);

    list.replace(0, 5).unwrap();
    assert_eq!(sum.get(), 70);
}

#[test]
fn test_reentrant_mutation_rejected() {
    let list = ObservableList::from_vec(vec![1]);
    let inner = list.clone();
    let results = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let recorder = results.clone();
    let _guard = list.add_decorated_listener(move |_| {
        recorder.lock().push((inner.push(99).is_err(), inner.len()));
    });

    list.push(2).unwrap();
    assert_eq!(*results.lock(), vec![(true, 2)]);
    assert_eq!(list.items(), vec![1, 2]);
}

#[test]
fn test_long_random_run_with_full_chain() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let list = ObservableList::from_vec((0..10).collect());
    let stages = [
        Stage::Convert,
        Stage::Filter,
        Stage::Group,
        Stage::Sorting,
        Stage::Limit,
        Stage::HeaderFooter,
    ];
    for stage in stages {
        attach(&list, stage);
    }
    let mirror = Mirror::attach(&list);

    for _ in 0..500 {
        let op = match rng.gen_range(0..7) {
            0 => Op::Push(rng.gen_range(0..20)),
            1 => Op::Insert(rng.gen_range(0..64), rng.gen_range(0..20)),
            2 => Op::RemoveAt(rng.gen_range(0..64)),
            3 => Op::Move(rng.gen_range(0..64), rng.gen_range(0..64)),
            4 => Op::Replace(rng.gen_range(0..64), rng.gen_range(0..20)),
            5 => Op::Change(rng.gen_range(0..64), rng.gen_range(0..20)),
            _ => Op::Reset((0..rng.gen_range(0..12)).map(|_| rng.gen_range(0..20)).collect()),
        };
        apply(&list, &op);
    }
    mirror.assert_synced(&list);
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Insert(usize, i32),
    RemoveAt(usize),
    Move(usize, usize),
    Replace(usize, i32),
    Change(usize, i32),
    Reset(Vec<i32>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..20i32).prop_map(Op::Push),
        (any::<usize>(), 0..20i32).prop_map(|(index, value)| Op::Insert(index, value)),
        any::<usize>().prop_map(Op::RemoveAt),
        (any::<usize>(), any::<usize>()).prop_map(|(from, to)| Op::Move(from, to)),
        (any::<usize>(), 0..20i32).prop_map(|(index, value)| Op::Replace(index, value)),
        (any::<usize>(), 0..20i32).prop_map(|(index, value)| Op::Change(index, value)),
        prop::collection::vec(0..20i32, 0..6).prop_map(Op::Reset),
    ]
}

fn apply(list: &ObservableList<i32>, op: &Op) {
    let len = list.len();
    let result = match op.clone() {
        Op::Push(value) => list.push(value),
        Op::Insert(index, value) => list.insert(index % (len + 1), value),
        Op::RemoveAt(index) if len > 0 => list.remove_at(index % len).map(drop),
        Op::Move(from, to) if len > 0 => list.move_item(from % len, to % len),
        Op::Replace(index, value) if len > 0 => list.replace(index % len, value).map(drop),
        Op::Change(index, value) if len > 0 => list.update_item(index % len, None, |n| *n = value),
        Op::Reset(items) => list.reset(items),
        _ => Ok(()),
    };
    result.unwrap();
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Filter,
    Sort,
    Sorting,
    Distinct,
    Limit,
    Group,
    GroupHeader,
    HeaderFooter,
    ItemHeaderFooter,
    Convert,
    Tracker,
    FirstLast,
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Filter),
        Just(Stage::Sort),
        Just(Stage::Sorting),
        Just(Stage::Distinct),
        Just(Stage::Limit),
        Just(Stage::Group),
        Just(Stage::GroupHeader),
        Just(Stage::HeaderFooter),
        Just(Stage::ItemHeaderFooter),
        Just(Stage::Convert),
        Just(Stage::Tracker),
        Just(Stage::FirstLast),
    ]
}

fn attach(list: &ObservableList<i32>, stage: Stage) {
    let result = match stage {
        Stage::Filter => list.add_decorator(FilterDecorator::new(|n: &i32| n % 4 != 1)),
        Stage::Sort => {
            list.add_decorator(SortDecorator::new(Comparer::by_key(|n: &i32| n.rem_euclid(7))))
        }
        Stage::Sorting => list.add_decorator(SortingDecorator::new(Comparer::<i32>::descending())),
        Stage::Distinct => list.add_decorator(DistinctDecorator::new(|n: &i32| n.rem_euclid(5))),
        Stage::Limit => list
            .add_decorator(LimitDecorator::new(Some(3)).with_condition(|n: &i32| n % 2 == 0)),
        Stage::Group => list.add_decorator(GroupDecorator::new(
            |n: &i32| (*n >= 0).then_some(n / 10),
            |key: &i32| -1 - key,
        )),
        Stage::GroupHeader => list.add_decorator(GroupHeaderDecorator::new(
            |n: &i32| (*n >= 0).then_some(n % 3),
            |key: &i32| -10 - key,
        )),
        Stage::HeaderFooter => {
            list.add_decorator(HeaderFooterDecorator::new(vec![-50], vec![-60, -70]))
        }
        Stage::ItemHeaderFooter => {
            list.add_decorator(ItemHeaderFooterDecorator::new(|n: &i32| match n {
                0..=2 => ItemPlacement::Header,
                17..=19 => ItemPlacement::Footer,
                _ => ItemPlacement::Body,
            }))
        }
        Stage::Convert => list
            .add_decorator(ConvertDecorator::new(|n: &i32, _previous: Option<&i32>| n + 1)),
        Stage::Tracker => list.add_decorator(TrackerDecorator::new(
            |n: &i32| *n,
            0usize,
            |count, _, _| *count += 1,
            |count, _, _| *count -= 1,
        )),
        Stage::FirstLast => list.add_decorator(FirstLastTrackerDecorator::new(TrackPosition::Last)),
    };
    result.unwrap();
}

fn stable_sort_by_key(items: &[i32], key: impl Fn(&i32) -> i32) -> Vec<i32> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(key);
    sorted
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// The decorated view always equals the chain folded over the raw items,
    /// and every event fits the view it was emitted for.
    #[test]
    fn prop_chain_matches_fold(
        initial in prop::collection::vec(0..20i32, 0..8),
        stages in prop::collection::vec(stage_strategy(), 1..4),
        ops in prop::collection::vec(op_strategy(), 1..24),
    ) {
        let list = ObservableList::from_vec(initial);
        for stage in &stages {
            attach(&list, *stage);
        }
        let mirror = Mirror::attach(&list);

        for op in &ops {
            apply(&list, op);
            prop_assert_eq!(mirror.items(), list.decorated_items());
        }

        let fresh = ObservableList::from_vec(list.items());
        for stage in &stages {
            attach(&fresh, *stage);
        }
        prop_assert_eq!(fresh.decorated_items(), list.decorated_items());
    }

    /// Every decorated position is found again by looking up its item.
    #[test]
    fn prop_index_lookup_round_trips(
        initial in prop::collection::vec(0..20i32, 0..12),
        stages in prop::collection::vec(stage_strategy(), 1..4),
    ) {
        let list = ObservableList::from_vec(initial);
        for stage in &stages {
            attach(&list, *stage);
        }
        let view = list.decorated_items();
        for (position, item) in view.iter().enumerate() {
            let found = list.try_get_indexes(item, false);
            prop_assert!(found.contains(&position), "{item} at {position} not in {found:?}");
            for index in &found {
                prop_assert_eq!(&view[*index], item);
            }
        }
    }

    #[test]
    fn prop_distinct_keeps_first_of_each_key(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let list = ObservableList::new();
        list.add_decorator(DistinctDecorator::new(|n: &i32| n % 4)).unwrap();
        for op in &ops {
            apply(&list, op);
        }
        let mut seen = HashSet::new();
        let expected: Vec<i32> = list.items().into_iter().filter(|n| seen.insert(n % 4)).collect();
        prop_assert_eq!(list.decorated_items(), expected);
    }

    #[test]
    fn prop_group_headers_lead_by_first_appearance(
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let list = ObservableList::new();
        list.add_decorator(GroupDecorator::new(|n: &i32| Some(n / 5), |key: &i32| -1 - key))
            .unwrap();
        for op in &ops {
            apply(&list, op);
        }
        let raw = list.items();
        let mut seen = HashSet::new();
        let mut expected: Vec<i32> =
            raw.iter().filter(|n| seen.insert(*n / 5)).map(|n| -1 - n / 5).collect();
        expected.extend(raw);
        prop_assert_eq!(list.decorated_items(), expected);
    }

    #[test]
    fn prop_limit_caps_matching_items(
        limit in 0..5usize,
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let list = ObservableList::new();
        list.add_decorator(LimitDecorator::new(Some(limit)).with_condition(|n: &i32| n % 3 == 0))
            .unwrap();
        for op in &ops {
            apply(&list, op);
        }
        let mut matched = 0;
        let expected: Vec<i32> = list
            .items()
            .into_iter()
            .filter(|n| {
                if n % 3 != 0 {
                    return true;
                }
                matched += 1;
                matched <= limit
            })
            .collect();
        prop_assert_eq!(list.decorated_items(), expected);
    }

    /// Equal keys keep their upstream order under both sorting strategies.
    #[test]
    fn prop_sorts_are_stable(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let sort = ObservableList::new();
        sort.add_decorator(SortDecorator::new(Comparer::by_key(|n: &i32| n / 5))).unwrap();
        let sorting = ObservableList::new();
        sorting.add_decorator(SortingDecorator::new(Comparer::by_key(|n: &i32| n / 5))).unwrap();
        for op in &ops {
            apply(&sort, op);
            apply(&sorting, op);
        }
        let expected = stable_sort_by_key(&sort.items(), |n| n / 5);
        prop_assert_eq!(sort.decorated_items(), expected.clone());
        prop_assert_eq!(sorting.decorated_items(), expected);
    }
}
