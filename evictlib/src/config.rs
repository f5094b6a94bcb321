use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

pub const DEFAULT_MAX_KEYS: usize = 150;
pub const DEFAULT_TOTAL_INSTANCES: usize = 50_000;
pub const DEFAULT_INSTANCES_PER_QUERY: usize = 128;
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;
pub const DEFAULT_SKEW_EXPONENT: f64 = 2.2;
pub const DEFAULT_HEAD_FRACTION: f64 = 0.8;
pub const DEFAULT_EVEN_FRACTION: f64 = 0.2;
pub const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379/0";

/// A full benchmark configuration, usually parsed from JSON
///
/// Every field has a default, so `{}` is a valid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    #[serde(default = "default_total_instances")]
    pub total_instances: usize,
    #[serde(default = "default_instances_per_query")]
    pub instances_per_query: usize,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_skew_exponent")]
    pub skew_exponent: f64,
    #[serde(default = "default_head_fraction")]
    pub head_fraction: f64,
    #[serde(default = "default_even_fraction")]
    pub even_fraction: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub workload_source: WorkloadSource,
    // Replays the workload in a random order, as requests would arrive with jitter
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicyKind>,
    #[serde(default = "default_distributions")]
    pub distributions: Vec<DistributionKind>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_records")]
    pub records: PathBuf,
    #[serde(default)]
    pub store: StoreConfig,
}

/// The eviction policy for a run - lru, random, or unbounded
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    #[serde(alias = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "random")]
    UniformRandom,
    #[serde(alias = "unbounded")]
    Unbounded,
}

/// The access distribution of a workload - long_tail or even
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionKind {
    #[serde(alias = "long_tail")]
    LongTail,
    #[serde(alias = "even")]
    Even,
}

/// Where the synthesizer draws its sample from
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadSource {
    /// A random sample of the whole population, shared by both workloads
    #[default]
    #[serde(alias = "population")]
    Population,
    /// A random sample of each distribution's own analyzer selection
    #[serde(alias = "selection")]
    Selection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_url")]
    pub url: String,
}

/// The backing store implementation - memory or resp
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreKind {
    #[default]
    #[serde(alias = "memory")]
    Memory,
    #[serde(alias = "resp", alias = "redis")]
    Resp,
}

/// A parsed `redis://host:port/db` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAddress {
    pub host: String,
    pub port: u16,
    pub database: u32,
}

/// The settings one simulator run needs
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub max_keys: usize,
    pub seed: Option<u64>,
    pub shuffle: bool,
}

fn default_max_keys() -> usize { DEFAULT_MAX_KEYS }
fn default_total_instances() -> usize { DEFAULT_TOTAL_INSTANCES }
fn default_instances_per_query() -> usize { DEFAULT_INSTANCES_PER_QUERY }
fn default_sample_size() -> usize { DEFAULT_SAMPLE_SIZE }
fn default_skew_exponent() -> f64 { DEFAULT_SKEW_EXPONENT }
fn default_head_fraction() -> f64 { DEFAULT_HEAD_FRACTION }
fn default_even_fraction() -> f64 { DEFAULT_EVEN_FRACTION }
fn default_shuffle() -> bool { true }
fn default_policies() -> Vec<PolicyKind> { vec![PolicyKind::LeastRecentlyUsed, PolicyKind::UniformRandom] }
fn default_distributions() -> Vec<DistributionKind> { vec![DistributionKind::LongTail, DistributionKind::Even] }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_records() -> PathBuf { PathBuf::from("data/records.json") }
fn default_store_url() -> String { DEFAULT_STORE_URL.to_owned() }

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
            total_instances: DEFAULT_TOTAL_INSTANCES,
            instances_per_query: DEFAULT_INSTANCES_PER_QUERY,
            sample_size: DEFAULT_SAMPLE_SIZE,
            skew_exponent: DEFAULT_SKEW_EXPONENT,
            head_fraction: DEFAULT_HEAD_FRACTION,
            even_fraction: DEFAULT_EVEN_FRACTION,
            seed: None,
            workload_source: WorkloadSource::default(),
            shuffle: true,
            policies: default_policies(),
            distributions: default_distributions(),
            data_dir: default_data_dir(),
            records: default_records(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            url: default_store_url(),
        }
    }
}

impl BenchmarkConfig {
    /// Reads and validates a configuration file
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let config: BenchmarkConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("couldn't parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no stage can work with. Called before anything runs
    pub fn validate(&self) -> Result<()> {
        if self.max_keys == 0 {
            return Err(Error::Config("max_keys must be at least 1".into()));
        }
        if !(self.skew_exponent.is_finite() && self.skew_exponent > 0.0) {
            return Err(Error::Config(format!("skew_exponent must be positive, got {}", self.skew_exponent)));
        }
        for (name, value) in [("head_fraction", self.head_fraction), ("even_fraction", self.even_fraction)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        if self.policies.is_empty() || self.distributions.is_empty() {
            return Err(Error::Config("at least one policy and one distribution are required".into()));
        }
        if self.store.kind == StoreKind::Resp {
            StoreAddress::parse(&self.store.url)?;
        }
        Ok(())
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            max_keys: self.max_keys,
            seed: self.seed,
            shuffle: self.shuffle,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
            seed: None,
            shuffle: true,
        }
    }
}

impl PolicyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::LeastRecentlyUsed => "LRU",
            PolicyKind::UniformRandom => "Random",
            PolicyKind::Unbounded => "Unbounded",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DistributionKind {
    pub const ALL: [DistributionKind; 2] = [DistributionKind::LongTail, DistributionKind::Even];

    /// The prefix used for this distribution's artifact files
    pub fn file_stem(&self) -> &'static str {
        match self {
            DistributionKind::LongTail => "long_tail",
            DistributionKind::Even => "even",
        }
    }

    pub fn from_file_stem(stem: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.file_stem() == stem)
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionKind::LongTail => f.write_str("long-tail"),
            DistributionKind::Even => f.write_str("even"),
        }
    }
}

impl StoreAddress {
    /// Parses a `redis://host[:port][/db]` url, the port defaults to 6379 and the database to 0
    ///
    /// # Examples
    ///
    /// ```
    /// use evictlib::config::StoreAddress;
    /// let address = StoreAddress::parse("redis://cache:6380/2").unwrap();
    /// assert_eq!((address.host.as_str(), address.port, address.database), ("cache", 6380, 2));
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let pattern = Regex::new(r"^redis://(?P<host>[^:/\s]+)(?::(?P<port>[0-9]+))?(?:/(?P<db>[0-9]+)?)?$")
            .map_err(|e| Error::Config(e.to_string()))?;
        let tokens = pattern.captures(url).ok_or_else(|| Error::Config(format!("couldn't parse store url {url}")))?;
        let port = match tokens.name("port") {
            Some(port) => port.as_str().parse().map_err(|e| Error::Config(format!("bad port in {url}: {e}")))?,
            None => 6379,
        };
        let database = match tokens.name("db") {
            Some(db) => db.as_str().parse().map_err(|e| Error::Config(format!("bad database in {url}: {e}")))?,
            None => 0,
        };
        Ok(Self {
            host: tokens["host"].to_owned(),
            port,
            database,
        })
    }
}
