//! Notifications published by a collection view.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// A change of the items a view exposes.
///
/// Indices are positions in the view (page-relative, depth-first when
/// grouping). After `Reset` consumers must re-read the view.
pub enum ViewChange<T> {
    /// `item` now appears at `index`.
    Add { item: Arc<T>, index: usize },
    /// `item` no longer appears; it was at `index`.
    Remove { item: Arc<T>, index: usize },
    /// The item at `index` was swapped for another.
    Replace {
        old: Arc<T>,
        new: Arc<T>,
        index: usize,
    },
    /// `item` moved from `old_index` to `new_index`.
    Move {
        item: Arc<T>,
        new_index: usize,
        old_index: usize,
    },
    /// The contents changed wholesale.
    Reset,
}

impl<T> Clone for ViewChange<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Add { item, index } => Self::Add {
                item: item.clone(),
                index: *index,
            },
            Self::Remove { item, index } => Self::Remove {
                item: item.clone(),
                index: *index,
            },
            Self::Replace { old, new, index } => Self::Replace {
                old: old.clone(),
                new: new.clone(),
                index: *index,
            },
            Self::Move {
                item,
                new_index,
                old_index,
            } => Self::Move {
                item: item.clone(),
                new_index: *new_index,
                old_index: *old_index,
            },
            Self::Reset => Self::Reset,
        }
    }
}

impl<T> fmt::Debug for ViewChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { index, .. } => write!(f, "Add({index})"),
            Self::Remove { index, .. } => write!(f, "Remove({index})"),
            Self::Replace { index, .. } => write!(f, "Replace({index})"),
            Self::Move {
                new_index,
                old_index,
                ..
            } => write!(f, "Move({old_index} -> {new_index})"),
            Self::Reset => f.write_str("Reset"),
        }
    }
}

/// Payload of the currency notifications: the cursor before and after.
///
/// Notifications are delivered once the operation has completed, so while a
/// `current_changing` handler runs the view already shows the new state; the
/// `old_*` fields describe what it replaced.
pub struct CurrencyChange<T> {
    /// Current item before the change.
    pub old_item: Option<Arc<T>>,
    /// Current position before the change.
    pub old_position: isize,
    /// Current item after the change.
    pub new_item: Option<Arc<T>>,
    /// Current position after the change.
    pub new_position: isize,
}

impl<T> Clone for CurrencyChange<T> {
    fn clone(&self) -> Self {
        Self {
            old_item: self.old_item.clone(),
            old_position: self.old_position,
            new_item: self.new_item.clone(),
            new_position: self.new_position,
        }
    }
}

impl<T> fmt::Debug for CurrencyChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyChange({} -> {})", self.old_position, self.new_position)
    }
}

/// Payload of the page notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChange {
    /// Page index before the move.
    pub old_index: usize,
    /// Page index after the move.
    pub new_index: usize,
}

/// Everything a view operation wants announced, in order.
pub(crate) enum ViewEvent<T> {
    Collection(ViewChange<T>),
    CurrentChanging(CurrencyChange<T>),
    CurrentChanged(CurrencyChange<T>),
    PageChanging(PageChange),
    PageChanged(PageChange),
    SortChanged,
    FilterChanged,
    GroupingChanged,
    Refreshed,
    SortFailed(Error),
}

/// Events collected while the view state is locked.
pub(crate) struct EventQueue<T> {
    events: Vec<ViewEvent<T>>,
}

impl<T> EventQueue<T> {
    pub(crate) fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub(crate) fn push(&mut self, event: ViewEvent<T>) {
        self.events.push(event);
    }

    pub(crate) fn change(&mut self, change: ViewChange<T>) {
        self.events.push(ViewEvent::Collection(change));
    }

    /// Position to insert an event before the ones that follow.
    pub(crate) fn mark(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn insert(&mut self, mark: usize, event: ViewEvent<T>) {
        self.events.insert(mark.min(self.events.len()), event);
    }

    pub(crate) fn into_events(self) -> Vec<ViewEvent<T>> {
        self.events
    }

    #[cfg(test)]
    pub(crate) fn changes(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Collection(change) => Some(format!("{change:?}")),
                _ => None,
            })
            .collect()
    }
}

/// Indices (into `seq`) of one longest strictly increasing subsequence.
fn longest_increasing(seq: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; seq.len()];
    for i in 0..seq.len() {
        let position = tails.partition_point(|&t| seq[t] < seq[i]);
        if position > 0 {
            previous[i] = Some(tails[position - 1]);
        }
        if position == tails.len() {
            tails.push(i);
        } else {
            tails[position] = i;
        }
    }
    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = previous[i];
    }
    out.reverse();
    out
}

/// Queues the changes that turn `before` into `after`.
///
/// Removals come first, in descending index order, followed by additions in
/// ascending order; an item that changes place relative to the others is
/// removed and re-added. With `allow_replace`, a single swapped slot is
/// reported as `Replace` instead.
pub(crate) fn diff_transition<T>(
    before: &[Arc<T>],
    after: &[Arc<T>],
    allow_replace: bool,
    events: &mut EventQueue<T>,
) {
    if before.len() == after.len() {
        let mut differing = before
            .iter()
            .zip(after)
            .enumerate()
            .filter(|(_, (old, new))| !Arc::ptr_eq(old, new));
        match (differing.next(), differing.next()) {
            (None, _) => return,
            (Some((index, (old, new))), None) => {
                let old_kept = after.iter().any(|x| Arc::ptr_eq(x, old));
                let new_seen = before.iter().any(|x| Arc::ptr_eq(x, new));
                if allow_replace && !old_kept && !new_seen {
                    events.change(ViewChange::Replace {
                        old: old.clone(),
                        new: new.clone(),
                        index,
                    });
                    return;
                }
            }
            _ => {}
        }
    }

    let after_positions: HashMap<*const T, usize> = after
        .iter()
        .enumerate()
        .map(|(index, item)| (Arc::as_ptr(item), index))
        .collect();
    let retained: Vec<(usize, usize)> = before
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            after_positions
                .get(&Arc::as_ptr(item))
                .map(|&target| (index, target))
        })
        .collect();
    let targets: Vec<usize> = retained.iter().map(|&(_, target)| target).collect();
    let kept: Vec<(usize, usize)> = longest_increasing(&targets)
        .into_iter()
        .map(|i| retained[i])
        .collect();
    let kept_before: HashSet<usize> = kept.iter().map(|&(index, _)| index).collect();
    let kept_after: HashSet<usize> = kept.iter().map(|&(_, target)| target).collect();

    for (index, item) in before.iter().enumerate().rev() {
        if !kept_before.contains(&index) {
            events.change(ViewChange::Remove {
                item: item.clone(),
                index,
            });
        }
    }
    for (index, item) in after.iter().enumerate() {
        if !kept_after.contains(&index) {
            events.change(ViewChange::Add {
                item: item.clone(),
                index,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<Arc<usize>> {
        (0..n).map(Arc::new).collect()
    }

    fn pick(all: &[Arc<usize>], order: &[usize]) -> Vec<Arc<usize>> {
        order.iter().map(|&i| all[i].clone()).collect()
    }

    fn diff(before: &[Arc<usize>], after: &[Arc<usize>]) -> Vec<String> {
        let mut events = EventQueue::new();
        diff_transition(before, after, false, &mut events);
        events.changes()
    }

    /// Replays the queued changes and checks they produce `after`.
    fn replay(before: &[Arc<usize>], after: &[Arc<usize>]) {
        let mut events = EventQueue::new();
        diff_transition(before, after, false, &mut events);
        let mut list = before.to_vec();
        for event in events.into_events() {
            match event {
                ViewEvent::Collection(ViewChange::Remove { index, .. }) => {
                    list.remove(index);
                }
                ViewEvent::Collection(ViewChange::Add { item, index }) => list.insert(index, item),
                ViewEvent::Collection(ViewChange::Replace { new, index, .. }) => list[index] = new,
                _ => unreachable!(),
            }
        }
        assert!(list.iter().zip(after).all(|(a, b)| Arc::ptr_eq(a, b)));
        assert_eq!(list.len(), after.len());
    }

    #[test]
    fn identical_lists_emit_nothing() {
        let all = items(3);
        assert!(diff(&all, &all).is_empty());
    }

    #[test]
    fn single_slot_swap_is_replace_only_when_allowed() {
        let all = items(4);
        let before = pick(&all, &[0, 1]);
        let after = pick(&all, &[0, 3]);

        let mut events = EventQueue::new();
        diff_transition(&before, &after, true, &mut events);
        assert_eq!(events.changes(), vec!["Replace(1)"]);

        // A page eviction: the last item leaves before the new one shows.
        assert_eq!(diff(&before, &after), vec!["Remove(1)", "Add(1)"]);
        replay(&before, &after);
    }

    #[test]
    fn moved_item_is_removed_then_added() {
        let all = items(3);
        assert_eq!(
            diff(&pick(&all, &[0, 1, 2]), &pick(&all, &[1, 2, 0])),
            vec!["Remove(0)", "Add(2)"]
        );
        assert_eq!(
            diff(&pick(&all, &[0, 1, 2]), &pick(&all, &[2, 0, 1])),
            vec!["Remove(2)", "Add(0)"]
        );
    }

    #[test]
    fn arbitrary_transitions_replay() {
        let all = items(8);
        replay(&pick(&all, &[0, 1, 2, 3]), &pick(&all, &[4, 2, 1, 5]));
        replay(&pick(&all, &[7, 6, 5]), &pick(&all, &[5, 6, 7, 0]));
        replay(&pick(&all, &[0, 1, 2]), &[]);
        replay(&[], &pick(&all, &[3, 1]));
    }
}
