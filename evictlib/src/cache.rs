use std::collections::HashMap;
use crate::record::RecordId;

const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node {
    id: RecordId,
    // Towards the least recently used end
    prev: usize,
    // Towards the most recently used end
    next: usize,
}

/// An ordered membership index: which ids are cached, and in which order they were last used
///
/// This is a doubly linked list stored in a slot arena, with a hash index from id to slot. Every
/// operation is O(1): membership, moving an id to the most recently used end, and removing the
/// least recently used id
///
/// The index doesn't enforce a capacity itself, the policy owning it decides when to evict
#[derive(Debug, Clone)]
pub struct RecencyIndex {
    nodes: Vec<Node>,
    free: Vec<usize>,
    slots: HashMap<RecordId, usize>,
    oldest: usize,
    newest: usize,
}

impl Default for RecencyIndex {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl RecencyIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            slots: HashMap::with_capacity(capacity),
            oldest: NIL,
            newest: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Marks `id` as the most recently used. Returns false if it isn't in the index
    pub fn touch(&mut self, id: RecordId) -> bool {
        match self.slots.get(&id) {
            Some(&slot) => {
                if slot != self.newest {
                    self.unlink(slot);
                    self.link_newest(slot);
                }
                true
            }
            None => false,
        }
    }

    /// Inserts `id` as the most recently used, or just touches it if it's already present
    pub fn push_most_recent(&mut self, id: RecordId) {
        if self.touch(id) {
            return;
        }
        let node = Node { id, prev: NIL, next: NIL };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.slots.insert(id, slot);
        self.link_newest(slot);
    }

    pub fn least_recent(&self) -> Option<RecordId> {
        (self.oldest != NIL).then(|| self.nodes[self.oldest].id)
    }

    pub fn most_recent(&self) -> Option<RecordId> {
        (self.newest != NIL).then(|| self.nodes[self.newest].id)
    }

    /// Removes and returns the least recently used id
    pub fn pop_least_recent(&mut self) -> Option<RecordId> {
        let id = self.least_recent()?;
        self.remove(id);
        Some(id)
    }

    pub fn remove(&mut self, id: RecordId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                self.unlink(slot);
                self.free.push(slot);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.slots.clear();
        self.oldest = NIL;
        self.newest = NIL;
    }

    /// Iterates from the least to the most recently used id
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        let mut slot = self.oldest;
        std::iter::from_fn(move || {
            if slot == NIL {
                return None;
            }
            let node = &self.nodes[slot];
            slot = node.next;
            Some(node.id)
        })
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.oldest = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.newest = prev;
        }
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = NIL;
    }

    fn link_newest(&mut self, slot: usize) {
        self.nodes[slot].prev = self.newest;
        self.nodes[slot].next = NIL;
        if self.newest != NIL {
            self.nodes[self.newest].next = slot;
        } else {
            self.oldest = slot;
        }
        self.newest = slot;
    }
}
