use std::collections::HashMap;
use crate::error::{Error, Result};
use crate::record::RecordId;

pub mod resp;

pub use resp::RespStore;

/// The external key-value store the simulated cache writes through to
///
/// Keys are record ids, values are serialised records. A store is owned by one simulation run at a
/// time, runs flush it on entry and exit. Implementations don't retry; a failed operation is
/// reported as [`Error::StoreUnavailable`]
pub trait BackingStore {
    fn connect(&mut self) -> Result<()>;

    fn get(&mut self, key: RecordId) -> Result<Option<String>>;

    fn set(&mut self, key: RecordId, payload: &str) -> Result<()>;

    fn del(&mut self, key: RecordId) -> Result<()>;

    /// Removes every key of this store's namespace
    fn flush_all(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;

    fn contains(&mut self, key: RecordId) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn get(&mut self, key: RecordId) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: RecordId, payload: &str) -> Result<()> {
        (**self).set(key, payload)
    }

    fn del(&mut self, key: RecordId) -> Result<()> {
        (**self).del(key)
    }

    fn flush_all(&mut self) -> Result<()> {
        (**self).flush_all()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }
}

/// Operation counters of a [`MemoryStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOps {
    pub gets: u64,
    pub sets: u64,
    pub dels: u64,
    pub flushes: u64,
}

/// An in-process store for tests and benchmarks
///
/// It can be switched off to emulate an unreachable server, and entries can be dropped behind the
/// simulation's back to emulate external eviction
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<RecordId, String>,
    connected: bool,
    available: bool,
    ops: StoreOps,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            connected: false,
            available: true,
            ops: StoreOps::default(),
        }
    }

    /// When unavailable, connecting and every operation fail
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Drops an entry without the simulation knowing about it
    pub fn evict_external(&mut self, key: RecordId) -> bool {
        self.entries.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: RecordId) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn ops(&self) -> StoreOps {
        self.ops
    }

    fn check(&self) -> Result<()> {
        if !self.available {
            return Err(Error::StoreUnavailable("memory store switched off".into()));
        }
        if !self.connected {
            return Err(Error::StoreUnavailable("not connected".into()));
        }
        Ok(())
    }
}

impl BackingStore for MemoryStore {
    fn connect(&mut self) -> Result<()> {
        if !self.available {
            return Err(Error::StoreUnavailable("memory store switched off".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn get(&mut self, key: RecordId) -> Result<Option<String>> {
        self.check()?;
        self.ops.gets += 1;
        Ok(self.entries.get(&key).cloned())
    }

    fn set(&mut self, key: RecordId, payload: &str) -> Result<()> {
        self.check()?;
        self.ops.sets += 1;
        self.entries.insert(key, payload.to_owned());
        Ok(())
    }

    fn del(&mut self, key: RecordId) -> Result<()> {
        self.check()?;
        self.ops.dels += 1;
        self.entries.remove(&key);
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        self.check()?;
        self.ops.flushes += 1;
        self.entries.clear();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}
