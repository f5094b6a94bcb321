use std::fmt::Write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::analyzer::{DistributionSelection, SelectionStats};
use crate::benchmark::RunOutcome;
use crate::record::Record;

/// What the prepare stage produced for one distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub stats: SelectionStats,
    pub record_count: usize,
    pub group_count: usize,
    /// Length of the synthesized workload, if one was written
    pub workload_length: Option<usize>,
}

impl DistributionSummary {
    pub fn new(selection: &DistributionSelection, workload_length: Option<usize>) -> Self {
        Self {
            stats: selection.stats.clone(),
            record_count: selection.records.len(),
            group_count: selection.groups.len(),
            workload_length,
        }
    }
}

/// The summary report written next to the workload files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub long_tail_distribution: DistributionSummary,
    pub even_distribution: DistributionSummary,
    pub sample_size: usize,
    pub generated_at: DateTime<Utc>,
}

/// A selection file: its summary plus every selected record
#[derive(Debug, Serialize)]
pub struct SelectionArtifact<'a> {
    pub metadata: &'a DistributionSummary,
    pub groups: &'a [String],
    pub records: &'a [Record],
}

/// Every run of a benchmark, as written to the results file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    pub generated_at: DateTime<Utc>,
    pub runs: Vec<RunOutcome>,
}

/// Formats a hit rate as a percentage, `undefined` when there were no operations
///
/// # Examples
///
/// ```
/// use evictlib::report::format_hit_rate;
/// assert_eq!(format_hit_rate(Some(0.4)), "40.00%");
/// assert_eq!(format_hit_rate(None), "undefined");
/// ```
pub fn format_hit_rate(hit_rate: Option<f64>) -> String {
    match hit_rate {
        Some(rate) => format!("{:.2}%", rate * 100.0),
        None => "undefined".to_owned(),
    }
}

/// Renders the outcomes as a plain-text table, one line per run
pub fn format_results(runs: &[RunOutcome]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<10} {:>10} {:>10} {:>10} {:>10} {:>8}", "policy", "dist", "ops", "hits", "misses", "hit rate", "keys");
    for run in runs {
        let _ = match run {
            RunOutcome::Completed(result) => writeln!(
                out,
                "{:<10} {:<10} {:>10} {:>10} {:>10} {:>10} {:>8}",
                result.policy.name(),
                result.distribution.to_string(),
                result.total_ops,
                result.hits,
                result.misses,
                format_hit_rate(result.hit_rate),
                result.final_cache_size
            ),
            RunOutcome::Failed(failure) => writeln!(
                out,
                "{:<10} {:<10} failed during {}: {}",
                failure.policy.name(),
                failure.distribution.to_string(),
                failure.stage,
                failure.message
            ),
        };
    }
    out
}

/// Everything written to stdout for a finished suite: the table, or the outcomes as pretty JSON
pub fn render_results(runs: &[RunOutcome], json: bool) -> serde_json::Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(runs)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(format_results(runs))
    }
}
