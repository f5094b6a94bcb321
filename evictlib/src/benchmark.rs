use std::fmt;
use std::fs;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use crate::analyzer::{Analyzer, DistributionSelection};
use crate::config::{BenchmarkConfig, DistributionKind, PolicyKind, WorkloadSource};
use crate::error::{Error, Result};
use crate::io::{read_workload, StagedWrites};
use crate::record::Record;
use crate::report::{DistributionSummary, SelectionArtifact, Summary};
use crate::simulator::{SimulationResult, Simulator};
use crate::source::RecordSource;
use crate::store::BackingStore;
use crate::util::{discover_workloads, selection_path, workload_path, WorkloadArtifact, SUMMARY_FILE};
use crate::workload::{Synthesizer, Workload};

/// The pipeline stage an error surfaced in
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Prepare,
    LoadWorkload,
    Simulate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prepare => f.write_str("prepare"),
            Stage::LoadWorkload => f.write_str("load workload"),
            Stage::Simulate => f.write_str("simulate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub policy: PolicyKind,
    pub distribution: DistributionKind,
    pub stage: Stage,
    pub message: String,
}

/// How one (policy, distribution) pair ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(SimulationResult),
    Failed(RunFailure),
}

/// Every outcome of a suite, in the order the runs happened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkReport {
    pub runs: Vec<RunOutcome>,
}

impl BenchmarkReport {
    pub fn completed(&self) -> impl Iterator<Item = &SimulationResult> {
        self.runs.iter().filter_map(|run| match run {
            RunOutcome::Completed(result) => Some(result),
            RunOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunFailure> {
        self.runs.iter().filter_map(|run| match run {
            RunOutcome::Completed(_) => None,
            RunOutcome::Failed(failure) => Some(failure),
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn get(&self, policy: PolicyKind, distribution: DistributionKind) -> Option<&SimulationResult> {
        self.completed().find(|r| r.policy == policy && r.distribution == distribution)
    }
}

/// The output of the prepare stage
#[derive(Debug, Clone)]
pub struct Prepared {
    pub summary: Summary,
    pub artifacts: Vec<WorkloadArtifact>,
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Analyses the population, synthesizes the workloads and persists every artifact
///
/// Nothing is written unless every computation succeeded, and the artifacts are committed as one
/// set, so a failed prepare never leaves new workloads next to stale ones
pub fn prepare<S: RecordSource + ?Sized>(config: &BenchmarkConfig, source: &mut S) -> Result<Prepared> {
    let analyzer = Analyzer::new(config.head_fraction, config.even_fraction);
    let long_tail = analyzer.compute_long_tail(source)?;
    let even = analyzer.compute_even(source)?;
    let synthesizer = Synthesizer::from(config);
    let mut rng = rng_from(config.seed);

    let population_sample = match config.workload_source {
        WorkloadSource::Population => Some(source.fetch_random_sample(config.sample_size)?),
        WorkloadSource::Selection => None,
    };

    let mut workloads: Vec<(DistributionKind, Workload)> = Vec::new();
    for &distribution in &config.distributions {
        if workloads.iter().any(|(d, _)| *d == distribution) {
            continue;
        }
        let selection = match distribution {
            DistributionKind::LongTail => &long_tail,
            DistributionKind::Even => &even,
        };
        let selection_sample: Vec<Record>;
        let sample: &[Record] = match &population_sample {
            Some(sample) => sample,
            None => {
                let mut records = selection.records.clone();
                records.shuffle(&mut rng);
                records.truncate(config.sample_size);
                selection_sample = records;
                &selection_sample
            }
        };
        let workload = match distribution {
            DistributionKind::LongTail => synthesizer.long_tail(sample),
            DistributionKind::Even => synthesizer.even(sample),
        };
        info!(distribution = %distribution, sample = sample.len(), ops = workload.len(), "synthesized workload");
        workloads.push((distribution, workload));
    }

    let workload_length = |kind: DistributionKind| workloads.iter().find(|(d, _)| *d == kind).map(|(_, w)| w.len());
    let summary = Summary {
        long_tail_distribution: DistributionSummary::new(&long_tail, workload_length(DistributionKind::LongTail)),
        even_distribution: DistributionSummary::new(&even, workload_length(DistributionKind::Even)),
        sample_size: config.sample_size,
        generated_at: Utc::now(),
    };

    fs::create_dir_all(&config.data_dir).map_err(|e| Error::io(&config.data_dir, e))?;
    let mut writes = StagedWrites::new();
    let mut artifacts = Vec::with_capacity(workloads.len());
    for (distribution, workload) in &workloads {
        let path = workload_path(&config.data_dir, *distribution);
        writes.stage(&path, workload)?;
        artifacts.push(WorkloadArtifact { distribution: *distribution, path });
    }
    stage_selection(&mut writes, config, &long_tail, &summary.long_tail_distribution)?;
    stage_selection(&mut writes, config, &even, &summary.even_distribution)?;
    writes.stage(&config.data_dir.join(SUMMARY_FILE), &summary)?;
    writes.commit()?;
    info!(data_dir = %config.data_dir.display(), workloads = artifacts.len(), "artifacts written");
    Ok(Prepared { summary, artifacts })
}

fn stage_selection(writes: &mut StagedWrites, config: &BenchmarkConfig, selection: &DistributionSelection, metadata: &DistributionSummary) -> Result<()> {
    let artifact = SelectionArtifact {
        metadata,
        groups: &selection.groups,
        records: &selection.records,
    };
    writes.stage(&selection_path(&config.data_dir, selection.kind), &artifact)
}

/// Finds the previously prepared workload of every configured distribution
///
/// A distribution with no file on disk still gets an entry at its expected path, so the suite
/// reports it as a failed load rather than silently skipping it
pub fn workloads_on_disk(config: &BenchmarkConfig) -> Result<Vec<WorkloadArtifact>> {
    let found = discover_workloads(&config.data_dir)?;
    let mut artifacts: Vec<WorkloadArtifact> = Vec::new();
    for &distribution in &config.distributions {
        if artifacts.iter().any(|a| a.distribution == distribution) {
            continue;
        }
        match found.iter().find(|a| a.distribution == distribution) {
            Some(artifact) => artifacts.push(artifact.clone()),
            None => {
                let path = workload_path(&config.data_dir, distribution);
                warn!(distribution = %distribution, path = %path.display(), "no workload on disk");
                artifacts.push(WorkloadArtifact { distribution, path });
            }
        }
    }
    Ok(artifacts)
}

/// Runs every configured policy against every artifact, one run at a time
///
/// Runs share the store, each flushes it on entry and exit. A workload that can't be loaded fails
/// every run of its distribution, a store failure fails only its own run; either way the remaining
/// runs still happen
pub fn run_suite<S: BackingStore + ?Sized>(config: &BenchmarkConfig, artifacts: &[WorkloadArtifact], store: &mut S) -> BenchmarkReport {
    let mut report = BenchmarkReport::default();
    let mut run_index: u64 = 0;
    for artifact in artifacts {
        let distribution = artifact.distribution;
        let workload = match read_workload(&artifact.path) {
            Ok(workload) => workload,
            Err(e) => {
                error!(stage = %Stage::LoadWorkload, distribution = %distribution, error = %e, "couldn't load workload");
                for &policy in &config.policies {
                    report.runs.push(RunOutcome::Failed(RunFailure {
                        policy,
                        distribution,
                        stage: Stage::LoadWorkload,
                        message: e.to_string(),
                    }));
                }
                continue;
            }
        };
        info!(distribution = %distribution, ops = workload.len(), path = %artifact.path.display(), "loaded workload");

        for &policy in &config.policies {
            let mut simulation = config.simulation();
            simulation.seed = config.seed.map(|seed| seed.wrapping_add(run_index));
            run_index += 1;
            let outcome = Simulator::new(policy, distribution, &simulation)
                .and_then(|mut simulator| simulator.simulate(workload.clone(), &mut *store).cloned());
            match outcome {
                Ok(result) => report.runs.push(RunOutcome::Completed(result)),
                Err(e) => {
                    error!(stage = %Stage::Simulate, policy = %policy, distribution = %distribution, error = %e, "run failed");
                    report.runs.push(RunOutcome::Failed(RunFailure {
                        policy,
                        distribution,
                        stage: Stage::Simulate,
                        message: e.to_string(),
                    }));
                }
            }
        }
    }
    report
}
