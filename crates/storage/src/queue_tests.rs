// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ids(n: u32) -> Vec<ItemId> {
    (0..n).map(ItemId).collect()
}

#[test]
fn item_queue_fifo_and_front_insert() {
    let mut queue = ItemQueue::default();
    let [a, b, c] = [ItemId(0), ItemId(1), ItemId(2)];
    queue.push_back(a);
    queue.push_back(b);
    queue.push_front(c);
    assert_eq!(queue.iter().collect::<Vec<_>>(), vec![c, a, b]);
    assert!(queue.remove(a));
    assert!(!queue.remove(a));
    assert_eq!(queue.front(), Some(c));
    assert_eq!(queue.len(), 2);
}

#[test]
fn request_queue_serves_urgent_first() {
    let mut queue = RequestQueue::default();
    let items = ids(4);
    queue.push(items[0], false);
    queue.push(items[1], false);
    queue.push(items[2], true);
    queue.push(items[3], true);

    let order: Vec<ItemId> = std::iter::from_fn(|| queue.pop()).collect();
    assert_eq!(order, vec![items[2], items[3], items[0], items[1]]);
}

#[test]
fn popped_items_stay_in_container_until_placed() {
    let mut queue = RequestQueue::default();
    let id = ItemId(5);
    queue.push(id, false);
    assert_eq!(queue.pop(), Some(id));
    assert!(queue.contains(id));
    assert!(!queue.is_queued(id));
    assert_eq!(queue.num_queued(), 0);
    assert_eq!(queue.len(), 1);

    assert!(queue.mark_assigned(id));
    assert!(queue.is_assigned(id));
    assert!(queue.remove(id));
    assert!(queue.is_empty());
}

#[test]
fn promote_moves_normal_item_to_urgent() {
    let mut queue = RequestQueue::default();
    let items = ids(2);
    queue.push(items[0], false);
    queue.push(items[1], false);
    queue.promote(items[1]);
    assert_eq!(queue.num_urgent_queued(), 1);
    assert_eq!(queue.pop(), Some(items[1]));
}

#[test]
fn push_front_jumps_the_line() {
    let mut queue = RequestQueue::default();
    let items = ids(3);
    queue.push(items[0], false);
    queue.push(items[1], false);
    queue.push_front(items[2], false);
    assert_eq!(queue.pop(), Some(items[2]));
}

#[test]
fn mark_assigned_unknown_item_is_rejected() {
    let mut queue = RequestQueue::default();
    assert!(!queue.mark_assigned(ItemId(1)));
    assert_eq!(queue.num_assigned(), 0);
}
