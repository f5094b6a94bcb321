use std::collections::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use crate::cache::RecencyIndex;
use crate::config::PolicyKind;
use crate::error::{Error, Result};
use crate::record::{Record, RecordId};
use crate::store::BackingStore;

/// What happened to a single access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `repaired` is set when the store had lost an entry the policy still owned, and it was
    /// written back
    Hit { repaired: bool },
    /// `evicted` is the id that made room for the new entry, if the cache was full
    Miss { evicted: Option<RecordId>, repaired: bool },
}

impl Access {
    pub fn is_hit(&self) -> bool {
        matches!(self, Access::Hit { .. })
    }
}

/// A generic trait for implementing eviction policies. Can be used to parameterise a Simulator.
pub trait ReplacementPolicy {
    /// Serves one request for `record`, keeping the backing store in sync with the policy's own
    /// view of what is cached
    ///
    /// Implementations must never own more entries than their capacity once this returns, and
    /// must choose eviction victims from their own bookkeeping, never by scanning the store
    ///
    /// # Arguments
    ///
    /// * `record`: The requested record, its id is the store key
    /// * `store`: The backing store, exclusively owned by the current run
    ///
    /// returns: Result<Access>, any store error aborts the run
    fn access<S: BackingStore + ?Sized>(&mut self, record: &Record, store: &mut S) -> Result<Access>;

    /// The number of entries the policy currently considers cached
    fn cached_len(&self) -> usize;

    /// Forgets every entry, used when the store is flushed between runs
    fn clear(&mut self);
}

/// Least Recently Used eviction policy
///
/// Hits are decided by the local recency index, the store is only checked afterwards so an entry
/// lost externally can be restored
pub struct LeastRecentlyUsed {
    capacity: usize,
    index: RecencyIndex,
}

impl LeastRecentlyUsed {
    /// `capacity` must be at least 1
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: RecencyIndex::with_capacity(capacity),
        }
    }

    pub fn index(&self) -> &RecencyIndex {
        &self.index
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn access<S: BackingStore + ?Sized>(&mut self, record: &Record, store: &mut S) -> Result<Access> {
        let key = record.id;
        if self.index.touch(key) {
            let repaired = !store.contains(key)?;
            if repaired {
                info!(key = %key, "store lost an indexed entry, restoring it");
                store.set(key, &record.to_payload()?)?;
            }
            return Ok(Access::Hit { repaired });
        }
        let evicted = if self.index.len() >= self.capacity {
            let victim = self.index.pop_least_recent();
            if let Some(victim) = victim {
                store.del(victim)?;
            }
            victim
        } else {
            None
        };
        store.set(key, &record.to_payload()?)?;
        self.index.push_most_recent(key);
        Ok(Access::Miss { evicted, repaired: false })
    }

    fn cached_len(&self) -> usize {
        self.index.len()
    }

    fn clear(&mut self) {
        self.index.clear();
    }
}

/// Uniform random eviction policy
///
/// Keeps no recency order, only the ids it has cached. Hits are decided by asking the store
pub struct UniformRandom {
    capacity: usize,
    cached: Vec<RecordId>,
    // Position of each id in `cached`, so misses on owned ids and swap-removal stay O(1)
    positions: HashMap<RecordId, usize>,
    rng: StdRng,
}

impl UniformRandom {
    /// `capacity` must be at least 1
    pub fn new(capacity: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            capacity,
            cached: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            rng,
        }
    }

    pub fn cached(&self) -> &[RecordId] {
        &self.cached
    }

    fn evict_random(&mut self) -> Option<RecordId> {
        if self.cached.is_empty() {
            return None;
        }
        let slot = self.rng.gen_range(0..self.cached.len());
        let victim = self.cached.swap_remove(slot);
        self.positions.remove(&victim);
        if let Some(&moved) = self.cached.get(slot) {
            self.positions.insert(moved, slot);
        }
        Some(victim)
    }
}

impl ReplacementPolicy for UniformRandom {
    fn access<S: BackingStore + ?Sized>(&mut self, record: &Record, store: &mut S) -> Result<Access> {
        let key = record.id;
        if store.contains(key)? {
            return Ok(Access::Hit { repaired: false });
        }
        // The store is the authority on hits, but an id we still own only needs writing back
        if self.positions.contains_key(&key) {
            info!(key = %key, "store lost an owned entry, restoring it");
            store.set(key, &record.to_payload()?)?;
            return Ok(Access::Miss { evicted: None, repaired: true });
        }
        let evicted = if self.cached.len() >= self.capacity {
            let victim = self.evict_random();
            if let Some(victim) = victim {
                store.del(victim)?;
            }
            victim
        } else {
            None
        };
        store.set(key, &record.to_payload()?)?;
        self.positions.insert(key, self.cached.len());
        self.cached.push(key);
        Ok(Access::Miss { evicted, repaired: false })
    }

    fn cached_len(&self) -> usize {
        self.cached.len()
    }

    fn clear(&mut self) {
        self.cached.clear();
        self.positions.clear();
    }
}

/// No eviction at all: every record stays cached once written
///
/// This is the unbounded baseline, the hit rate every bounded policy is compared against. It is
/// the only policy which ignores the key limit
#[derive(Default)]
pub struct Unbounded {
    cached: std::collections::HashSet<RecordId>,
}

impl ReplacementPolicy for Unbounded {
    fn access<S: BackingStore + ?Sized>(&mut self, record: &Record, store: &mut S) -> Result<Access> {
        let key = record.id;
        if store.contains(key)? {
            return Ok(Access::Hit { repaired: false });
        }
        store.set(key, &record.to_payload()?)?;
        let repaired = !self.cached.insert(key);
        Ok(Access::Miss { evicted: None, repaired })
    }

    fn cached_len(&self) -> usize {
        self.cached.len()
    }

    fn clear(&mut self) {
        self.cached.clear();
    }
}

/// Enum for every policy provided by the library
///
/// The trait has a generic method, so it can't be used as a trait object. Branching explicitly
/// on the concrete types also lets the compiler inline each policy into the simulation loop
pub enum GenericPolicy {
    LeastRecentlyUsed(LeastRecentlyUsed),
    UniformRandom(UniformRandom),
    Unbounded(Unbounded),
}

impl GenericPolicy {
    /// Creates the policy for `kind`, bounded to `max_keys` entries
    pub fn new(kind: PolicyKind, max_keys: usize, seed: Option<u64>) -> Result<Self> {
        if max_keys == 0 && kind != PolicyKind::Unbounded {
            return Err(Error::Config(format!("{kind} needs room for at least one key")));
        }
        Ok(match kind {
            PolicyKind::LeastRecentlyUsed => LeastRecentlyUsed::new(max_keys).into(),
            PolicyKind::UniformRandom => UniformRandom::new(max_keys, seed).into(),
            PolicyKind::Unbounded => Unbounded::default().into(),
        })
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            GenericPolicy::LeastRecentlyUsed(_) => PolicyKind::LeastRecentlyUsed,
            GenericPolicy::UniformRandom(_) => PolicyKind::UniformRandom,
            GenericPolicy::Unbounded(_) => PolicyKind::Unbounded,
        }
    }
}

impl From<LeastRecentlyUsed> for GenericPolicy {
    fn from(value: LeastRecentlyUsed) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<UniformRandom> for GenericPolicy {
    fn from(value: UniformRandom) -> Self {
        Self::UniformRandom(value)
    }
}

impl From<Unbounded> for GenericPolicy {
    fn from(value: Unbounded) -> Self {
        Self::Unbounded(value)
    }
}

impl ReplacementPolicy for GenericPolicy {
    fn access<S: BackingStore + ?Sized>(&mut self, record: &Record, store: &mut S) -> Result<Access> {
        match self {
            GenericPolicy::LeastRecentlyUsed(p) => p.access(record, store),
            GenericPolicy::UniformRandom(p) => p.access(record, store),
            GenericPolicy::Unbounded(p) => p.access(record, store),
        }
    }

    fn cached_len(&self) -> usize {
        match self {
            GenericPolicy::LeastRecentlyUsed(p) => p.cached_len(),
            GenericPolicy::UniformRandom(p) => p.cached_len(),
            GenericPolicy::Unbounded(p) => p.cached_len(),
        }
    }

    fn clear(&mut self) {
        match self {
            GenericPolicy::LeastRecentlyUsed(p) => p.clear(),
            GenericPolicy::UniformRandom(p) => p.clear(),
            GenericPolicy::Unbounded(p) => p.clear(),
        }
    }
}
