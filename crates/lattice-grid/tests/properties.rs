//! Invariants that must hold for any source contents and edit sequence.

use std::sync::Arc;

use proptest::prelude::*;

use lattice_grid::{CollectionView, DataItem, ObservableList, SortDescription, SortDirection, Value, ViewOptions};

#[derive(Debug)]
struct Cell {
    id: usize,
    key: i32,
}

impl DataItem for Cell {
    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "key" => Some(self.key.into()),
            "id" => Some(Value::U64(self.id as u64)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Insert(usize, i32),
    Remove(usize),
    Replace(usize, i32),
    Move(usize, usize),
    MoveCurrent(isize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-20i32..20).prop_map(Op::Push),
        (0usize..32, -20i32..20).prop_map(|(at, key)| Op::Insert(at, key)),
        (0usize..32).prop_map(Op::Remove),
        (0usize..32, -20i32..20).prop_map(|(at, key)| Op::Replace(at, key)),
        (0usize..32, 0usize..32).prop_map(|(from, to)| Op::Move(from, to)),
        (-1isize..12).prop_map(Op::MoveCurrent),
    ]
}

fn build(keys: &[i32]) -> Arc<ObservableList<Cell>> {
    Arc::new(ObservableList::new(
        keys.iter().enumerate().map(|(id, &key)| Cell { id, key }).collect(),
    ))
}

fn apply(list: &ObservableList<Cell>, view: &CollectionView<Cell>, op: Op, next_id: &mut usize) {
    let mut cell = |key| {
        *next_id += 1;
        Cell { id: *next_id, key }
    };
    let len = list.len();
    match op {
        Op::Push(key) => {
            list.push(cell(key));
        }
        Op::Insert(at, key) => list.insert(at % (len + 1), cell(key)),
        Op::Remove(at) if len > 0 => {
            list.remove(at % len);
        }
        Op::Replace(at, key) if len > 0 => {
            list.replace(at % len, cell(key));
        }
        Op::Move(from, to) if len > 0 => list.move_item(from % len, to % len),
        Op::MoveCurrent(position) => {
            let _ = view.move_current_to_position(position);
        }
        _ => {}
    }
}

fn check_currency(view: &CollectionView<Cell>) -> Result<(), TestCaseError> {
    let position = view.current_position();
    let count = view.count() as isize;
    if position == -1 || position == count {
        return Ok(());
    }
    let at = view.get_item_at(position as usize);
    let current = view.current_item();
    prop_assert!(
        matches!((&at, &current), (Some(a), Some(b)) if Arc::ptr_eq(a, b)),
        "position {} shows {:?} but current is {:?}",
        position,
        at,
        current
    );
    Ok(())
}

fn keep(cell: &Cell) -> bool {
    cell.key % 3 != 0
}

proptest! {
    #[test]
    fn filter_keeps_exactly_passing_items(
        keys in prop::collection::vec(-20i32..20, 0..24),
        ops in prop::collection::vec(op(), 0..24),
    ) {
        let list = build(&keys);
        let view = CollectionView::new(list.clone());
        view.set_filter_fn(keep).unwrap();
        let mut next_id = keys.len();
        for op in ops {
            apply(&list, &view, op, &mut next_id);
        }

        let mut expected: Vec<usize> = list.items().iter().filter(|cell| keep(cell)).map(|cell| cell.id).collect();
        let mut internal: Vec<usize> = view.internal_items().iter().map(|cell| cell.id).collect();
        expected.sort_unstable();
        internal.sort_unstable();
        prop_assert_eq!(internal, expected);
    }

    #[test]
    fn sort_is_stable(keys in prop::collection::vec(-4i32..4, 0..32)) {
        let view = CollectionView::new(build(&keys));
        view.set_filter_fn(|cell: &Cell| cell.id % 5 != 4).unwrap();
        view.set_sort_descriptions(vec![SortDescription::by_path("key", SortDirection::Descending)]).unwrap();

        let items = view.items();
        for pair in items.windows(2) {
            prop_assert!(pair[0].key >= pair[1].key);
            if pair[0].key == pair[1].key {
                prop_assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn page_holds_at_most_page_size(
        len in 0usize..40,
        page_size in 1usize..8,
        page in 0usize..8,
    ) {
        let keys: Vec<i32> = (0..len as i32).collect();
        let view = CollectionView::with_options(build(&keys), ViewOptions::default().with_page_size(page_size));
        let _ = view.move_to_page(page).unwrap();

        let index = view.page_index();
        let expected = page_size.min(len.saturating_sub(index * page_size));
        prop_assert!(view.count() <= page_size);
        prop_assert_eq!(view.count(), expected);
        prop_assert_eq!(view.item_count(), len);
    }

    #[test]
    fn currency_stays_consistent(
        keys in prop::collection::vec(-20i32..20, 0..16),
        ops in prop::collection::vec(op(), 0..32),
        sorted in any::<bool>(),
        page_size in 0usize..5,
    ) {
        let list = build(&keys);
        let view = CollectionView::with_options(list.clone(), ViewOptions::default().with_page_size(page_size));
        view.set_filter_fn(keep).unwrap();
        if sorted {
            view.set_sort_descriptions(vec![SortDescription::by_path("key", SortDirection::Ascending)]).unwrap();
        }
        check_currency(&view)?;
        let mut next_id = keys.len();
        for op in ops {
            apply(&list, &view, op, &mut next_id);
            check_currency(&view)?;
        }
    }
}
