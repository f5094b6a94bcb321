use std::time::{Duration, Instant};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::config::{DistributionKind, PolicyKind, SimulationConfig};
use crate::error::{Error, Result};
use crate::replacement_policies::{Access, GenericPolicy, ReplacementPolicy};
use crate::store::BackingStore;
use crate::workload::Workload;

/// Where a run is in its lifecycle
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Init,
    Running,
    Drained,
    Done,
    Failed,
}

/// The simulator replays one workload against one policy and collects results.
///
/// A run owns the backing store for its whole duration: the store is flushed before the first
/// access and after the last, so consecutive runs never see each other's keys
pub struct Simulator {
    policy: GenericPolicy,
    shuffle: bool,
    rng: StdRng,
    state: RunState,
    result: SimulationResult,
    simulation_time: Duration,
}

/// The result of one (policy, distribution) run. Can be serialised to the report format
///
/// `hit_rate` is `None` when the workload was empty, the rate is undefined then
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub policy: PolicyKind,
    pub distribution: DistributionKind,
    pub total_ops: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: Option<f64>,
    pub final_cache_size: usize,
    pub evictions: u64,
    pub drift_repairs: u64,
}

impl SimulationResult {
    fn new(policy: PolicyKind, distribution: DistributionKind) -> Self {
        Self {
            policy,
            distribution,
            total_ops: 0,
            hits: 0,
            misses: 0,
            hit_rate: None,
            final_cache_size: 0,
            evictions: 0,
            drift_repairs: 0,
        }
    }

    /// The hit rate as a plain float, NaN when no operation ran
    pub fn hit_rate_or_nan(&self) -> f64 {
        self.hit_rate.unwrap_or(f64::NAN)
    }

    fn record(&mut self, access: Access) {
        self.total_ops += 1;
        match access {
            Access::Hit { repaired } => {
                self.hits += 1;
                self.drift_repairs += repaired as u64;
            }
            Access::Miss { evicted, repaired } => {
                self.misses += 1;
                self.evictions += evicted.is_some() as u64;
                self.drift_repairs += repaired as u64;
            }
        }
    }
}

/// `hits / (hits + misses)`, or `None` if there were no operations
///
/// # Examples
///
/// ```
/// use evictlib::simulator::hit_rate;
/// assert_eq!(hit_rate(2, 3), Some(0.4));
/// assert_eq!(hit_rate(0, 0), None);
/// ```
pub fn hit_rate(hits: u64, misses: u64) -> Option<f64> {
    let total = hits + misses;
    (total > 0).then(|| hits as f64 / total as f64)
}

impl Simulator {
    /// Creates a simulator for one policy and distribution
    ///
    /// # Arguments
    ///
    /// * `policy`: The eviction policy to simulate
    /// * `distribution`: The distribution the workload was drawn from, only used for reporting
    /// * `config`: The key limit, whether to shuffle, and the seed for every random choice
    ///
    /// returns: Result<Simulator>, fails if the key limit is unusable for the policy
    pub fn new(policy: PolicyKind, distribution: DistributionKind, config: &SimulationConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // Derived from the run seed so the policy's choices don't depend on the shuffle's
        let policy_seed = config.seed.map(|seed| seed.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15);
        Ok(Self {
            policy: GenericPolicy::new(policy, config.max_keys, policy_seed)?,
            shuffle: config.shuffle,
            rng,
            state: RunState::Init,
            result: SimulationResult::new(policy, distribution),
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Runs the workload to completion against `store`
    ///
    /// Connects and flushes the store, consumes the workload (in a random order when shuffling is
    /// on), then flushes and disconnects. A store failure at any point aborts the run, leaving the
    /// store as last written
    ///
    /// # Arguments
    ///
    /// * `workload`: The access sequence, consumed
    /// * `store`: The backing store, owned by this run until it returns
    ///
    /// returns: Result<&SimulationResult>
    pub fn simulate<S: BackingStore + ?Sized>(&mut self, workload: Workload, store: &mut S) -> Result<&SimulationResult> {
        match self.run(workload, store) {
            Ok(()) => Ok(&self.result),
            Err(e) => {
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    fn run<S: BackingStore + ?Sized>(&mut self, mut workload: Workload, store: &mut S) -> Result<()> {
        if self.state != RunState::Init {
            return Err(Error::Config(format!("simulator already used, state {:?}", self.state)));
        }
        store.connect()?;
        store.flush_all()?;
        self.policy.clear();
        debug!(policy = %self.result.policy, distribution = %self.result.distribution, ops = workload.len(), "store flushed, starting run");

        self.state = RunState::Running;
        let start = Instant::now();
        if self.shuffle {
            workload.shuffle(&mut self.rng);
        }
        for record in workload.into_accesses() {
            let access = self.policy.access(&record, store)?;
            self.result.record(access);
        }
        self.simulation_time += start.elapsed();
        self.state = RunState::Drained;

        self.result.hit_rate = hit_rate(self.result.hits, self.result.misses);
        self.result.final_cache_size = self.policy.cached_len();
        store.flush_all()?;
        store.disconnect()?;
        self.state = RunState::Done;
        info!(
            policy = %self.result.policy,
            distribution = %self.result.distribution,
            total_ops = self.result.total_ops,
            hits = self.result.hits,
            misses = self.result.misses,
            final_cache_size = self.result.final_cache_size,
            "run complete"
        );
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn result(&self) -> &SimulationResult {
        &self.result
    }

    pub fn policy(&self) -> &GenericPolicy {
        &self.policy
    }

    /// Gets the wall-clock time spent draining the workload
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }
}
