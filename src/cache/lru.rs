//! LRU List Module
//!
//! Recency ordering for the cache, kept as a doubly-linked list threaded
//! through a flat slot arena.

use crate::cache::CacheEntry;

// == LRU List ==
/// Arena-backed doubly-linked list of cache entries.
///
/// - `head` = most recently used
/// - `tail` = least recently used
///
/// Freed slots are recycled through `free`, so indices handed out by
/// [`LruList::push_front`] stay stable until that entry is removed.
#[derive(Debug)]
pub struct LruList<V> {
    slots: Vec<Option<CacheEntry<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<V> Default for LruList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LruList<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Creates a list whose arena can hold `capacity` entries without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    // == Push Front ==
    /// Stores `entry` as the most recently used item and returns its slot.
    pub fn push_front(&mut self, mut entry: CacheEntry<V>) -> usize {
        entry.prev = None;
        entry.next = self.head;

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                idx
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        match self.head {
            Some(old_head) => self.node_mut(old_head).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
        idx
    }

    // == Move To Front ==
    /// Marks the entry in `idx` as most recently used.
    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);

        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    // == Remove ==
    /// Unlinks and returns the entry in `idx`, releasing the slot.
    pub fn remove(&mut self, idx: usize) -> Option<CacheEntry<V>> {
        self.slots.get(idx)?.as_ref()?;
        self.unlink(idx);
        let entry = self.slots[idx].take();
        self.free.push(idx);
        self.len -= 1;
        entry
    }

    // == Tail ==
    /// Slot of the least recently used entry.
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub fn get(&self, idx: usize) -> Option<&CacheEntry<V>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut CacheEntry<V>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Iterates live entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every entry and releases the arena.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node_mut(idx);
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    // Links always point at occupied slots; a vacant one here means the list
    // itself is corrupt.
    fn node_mut(&mut self, idx: usize) -> &mut CacheEntry<V> {
        match self.slots[idx].as_mut() {
            Some(node) => node,
            None => unreachable!("lru link points at vacant slot {idx}"),
        }
    }
}

// == Iterator ==
pub struct Iter<'a, V> {
    list: &'a LruList<V>,
    cursor: Option<usize>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (usize, &'a CacheEntry<V>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let entry = self.list.get(idx)?;
        self.cursor = entry.next;
        Some((idx, entry))
    }
}
