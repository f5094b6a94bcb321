use std::collections::HashSet;
use std::path::Path;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;
use crate::error::{Error, Result};
use crate::io::read_records;
use crate::record::Record;

/// The population the benchmark draws from
///
/// This mirrors what the event database offers to the pipeline: everything, a random sample, or
/// every record in a set of groups. Any fetch may fail, callers treat that as fatal
pub trait RecordSource {
    fn fetch_all(&mut self) -> Result<Vec<Record>>;

    /// Fetches up to `n` distinct records in random order
    fn fetch_random_sample(&mut self, n: usize) -> Result<Vec<Record>>;

    /// Fetches every record whose group is in `groups`, in population order
    fn fetch_where(&mut self, groups: &HashSet<String>) -> Result<Vec<Record>>;

    fn count_distinct_groups(&mut self) -> Result<usize>;
}

/// A record source held entirely in memory
///
/// Sampling uses its own RNG, seeded when reproducible workloads are wanted
pub struct MemorySource {
    records: Vec<Record>,
    rng: StdRng,
}

impl MemorySource {
    pub fn new(records: Vec<Record>, seed: Option<u64>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        if let Some(duplicate) = records.iter().find(|r| !seen.insert(r.id)) {
            return Err(Error::SourceUnavailable(format!("duplicate record id {}", duplicate.id)));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { records, rng })
    }

    /// Loads a population from a JSON array of records
    pub fn from_path(path: &Path, seed: Option<u64>) -> Result<Self> {
        let records = read_records(path)
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;
        debug!(path = %path.display(), records = records.len(), "loaded record population");
        Self::new(records, seed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for MemorySource {
    fn fetch_all(&mut self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }

    fn fetch_random_sample(&mut self, n: usize) -> Result<Vec<Record>> {
        let mut sample = self.records.clone();
        sample.shuffle(&mut self.rng);
        sample.truncate(n);
        Ok(sample)
    }

    fn fetch_where(&mut self, groups: &HashSet<String>) -> Result<Vec<Record>> {
        Ok(self.records
            .iter()
            .filter(|r| r.group.as_ref().map_or(false, |g| groups.contains(g)))
            .cloned()
            .collect())
    }

    fn count_distinct_groups(&mut self) -> Result<usize> {
        Ok(self.records.iter().filter_map(|r| r.group.as_deref()).collect::<HashSet<_>>().len())
    }
}
