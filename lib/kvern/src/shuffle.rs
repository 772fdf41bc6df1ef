//! Single-producer shuffle: k-way merge of the per-worker sorted buffers
//! into a queue of key groups. Runs on worker 0 only, after the post-map
//! barrier has made every buffer visible.

use std::cmp::{Ordering as KeyOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::api::keys_equal;
use crate::progress::PROCESSED_ONE;

/// A non-empty run of intermediate pairs sharing one key.
pub(crate) type Group<K, V> = Vec<(K, V)>;

/// One heap entry: the next pair of a source buffer. Ordered by key with
/// the source index as a tie-break so the ordering stays total when keys
/// compare equal.
struct Cursor<K, V> {
    key: K,
    value: V,
    source: usize,
}

impl<K: Ord, V> PartialEq for Cursor<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == KeyOrdering::Equal
    }
}

impl<K: Ord, V> Eq for Cursor<K, V> {}

impl<K: Ord, V> PartialOrd for Cursor<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<KeyOrdering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V> Ord for Cursor<K, V> {
    fn cmp(&self, other: &Self) -> KeyOrdering {
        self.key
            .cmp(&other.key)
            .then(self.source.cmp(&other.source))
    }
}

/// Merges the sorted buffers into groups of key-equal pairs, ascending by
/// key. Adds `PROCESSED_ONE` to `progress` for every pair moved into a
/// group; the caller has already stored the shuffle-stage word with the
/// pair total.
pub(crate) fn merge_groups<K: Ord, V>(
    buffers: Vec<Vec<(K, V)>>,
    progress: &AtomicU64,
) -> Vec<Group<K, V>> {
    let mut cursors: Vec<std::vec::IntoIter<(K, V)>> =
        buffers.into_iter().map(Vec::into_iter).collect();

    let mut heap = BinaryHeap::with_capacity(cursors.len());
    for (source, cursor) in cursors.iter_mut().enumerate() {
        if let Some((key, value)) = cursor.next() {
            heap.push(Reverse(Cursor { key, value, source }));
        }
    }

    let mut groups: Vec<Group<K, V>> = Vec::new();
    while let Some(Reverse(head)) = heap.pop() {
        if let Some((key, value)) = cursors[head.source].next() {
            heap.push(Reverse(Cursor {
                key,
                value,
                source: head.source,
            }));
        }
        progress.fetch_add(PROCESSED_ONE, Ordering::Relaxed);
        let mut group: Group<K, V> = vec![(head.key, head.value)];

        // Drain every cursor whose key is equivalent to the group key.
        loop {
            match heap.peek() {
                Some(Reverse(next)) if keys_equal(&next.key, &group[0].0) => {}
                _ => break,
            }
            let Some(Reverse(next)) = heap.pop() else { break };
            if let Some((key, value)) = cursors[next.source].next() {
                heap.push(Reverse(Cursor {
                    key,
                    value,
                    source: next.source,
                }));
            }
            progress.fetch_add(PROCESSED_ONE, Ordering::Relaxed);
            group.push((next.key, next.value));
        }
        groups.push(group);
    }

    debug!(groups = groups.len(), "shuffle merge finished");
    groups
}
