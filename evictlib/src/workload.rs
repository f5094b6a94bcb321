use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::config::{BenchmarkConfig, DEFAULT_INSTANCES_PER_QUERY, DEFAULT_SKEW_EXPONENT, DEFAULT_TOTAL_INSTANCES};
use crate::record::Record;

/// A materialised access sequence. Duplicates are expected, each entry is one request
///
/// Serialises to a plain JSON array of records, which is the on-disk workload format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workload(Vec<Record>);

impl Workload {
    pub fn new(accesses: Vec<Record>) -> Self {
        Self(accesses)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn accesses(&self) -> &[Record] {
        &self.0
    }

    /// Shuffles the request order in place (Fisher-Yates)
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.0.shuffle(rng);
    }

    pub fn into_accesses(self) -> Vec<Record> {
        self.0
    }
}

impl From<Vec<Record>> for Workload {
    fn from(value: Vec<Record>) -> Self {
        Self(value)
    }
}

/// The copy count of each rank for a rank-weighted workload
///
/// Rank `i` (1-based) weighs `1 / i^alpha`. Weights are normalised and scaled to
/// `total_instances`, then floored, so low ranks may get no copies at all
///
/// # Examples
///
/// ```
/// use evictlib::workload::rank_weighted_counts;
/// let counts = rank_weighted_counts(3, 1.0, 100);
/// assert_eq!(counts, vec![54, 27, 18]);
/// ```
pub fn rank_weighted_counts(ranks: usize, alpha: f64, total_instances: usize) -> Vec<usize> {
    let weights: Vec<f64> = (1..=ranks).map(|rank| 1.0 / (rank as f64).powf(alpha)).collect();
    let total_weight: f64 = weights.iter().sum();
    weights
        .iter()
        .map(|weight| (weight / total_weight * total_instances as f64).floor() as usize)
        .collect()
}

/// Expands the sample into a skewed sequence, copies grouped by rank in sample order
pub fn rank_weighted(sample: &[Record], alpha: f64, total_instances: usize) -> Workload {
    let counts = rank_weighted_counts(sample.len(), alpha, total_instances);
    let mut accesses = Vec::with_capacity(counts.iter().sum());
    for (record, &count) in sample.iter().zip(&counts) {
        accesses.extend(std::iter::repeat(record).take(count).cloned());
    }
    Workload(accesses)
}

/// Expands the sample into a uniform sequence with `instances_per_query` copies of every record
pub fn flat_weighted(sample: &[Record], instances_per_query: usize) -> Workload {
    let mut accesses = Vec::with_capacity(sample.len() * instances_per_query);
    for record in sample {
        accesses.extend(std::iter::repeat(record).take(instances_per_query).cloned());
    }
    Workload(accesses)
}

/// Builds both workloads from a sample. Holds no state besides its parameters
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Synthesizer {
    pub skew_exponent: f64,
    pub total_instances: usize,
    pub instances_per_query: usize,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self {
            skew_exponent: DEFAULT_SKEW_EXPONENT,
            total_instances: DEFAULT_TOTAL_INSTANCES,
            instances_per_query: DEFAULT_INSTANCES_PER_QUERY,
        }
    }
}

impl From<&BenchmarkConfig> for Synthesizer {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            skew_exponent: config.skew_exponent,
            total_instances: config.total_instances,
            instances_per_query: config.instances_per_query,
        }
    }
}

impl Synthesizer {
    pub fn long_tail(&self, sample: &[Record]) -> Workload {
        rank_weighted(sample, self.skew_exponent, self.total_instances)
    }

    pub fn even(&self, sample: &[Record]) -> Workload {
        flat_weighted(sample, self.instances_per_query)
    }
}
