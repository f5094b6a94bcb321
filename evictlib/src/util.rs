use std::fs;
use std::path::{Path, PathBuf};
use regex::Regex;
use crate::config::DistributionKind;
use crate::error::{Error, Result};

pub const LONG_TAIL_SELECTION_FILE: &str = "long_tail_selection.json";
pub const EVEN_SELECTION_FILE: &str = "even_selection.json";
pub const SUMMARY_FILE: &str = "cache_test_summary.json";

/// A workload file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadArtifact {
    pub distribution: DistributionKind,
    pub path: PathBuf,
}

/// Where the prepare stage writes the workload of a distribution
pub fn workload_path(dir: &Path, distribution: DistributionKind) -> PathBuf {
    dir.join(format!("{}_distribution.json", distribution.file_stem()))
}

/// Where the prepare stage writes the analyzer selection of a distribution
pub fn selection_path(dir: &Path, distribution: DistributionKind) -> PathBuf {
    match distribution {
        DistributionKind::LongTail => dir.join(LONG_TAIL_SELECTION_FILE),
        DistributionKind::Even => dir.join(EVEN_SELECTION_FILE),
    }
}

/// Lists the workload files in `dir`, sorted by file name
///
/// Files named `<distribution>_distribution.json` for an unknown distribution are skipped
pub fn discover_workloads(dir: &Path) -> Result<Vec<WorkloadArtifact>> {
    let pattern = Regex::new(r"^(?P<distribution>[a-z_]+)_distribution\.json$").map_err(|e| Error::Config(e.to_string()))?;
    let mut files = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok().map(|name| (name, entry.path())))
        .filter(|(name, _)| pattern.is_match(name))
        .collect::<Vec<_>>();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = Vec::new();
    for (file_name, path) in files {
        let tokens = pattern.captures(&file_name).ok_or_else(|| Error::Config(format!("couldn't parse the file name {file_name}")))?;
        if let Some(distribution) = DistributionKind::from_file_stem(&tokens["distribution"]) {
            out.push(WorkloadArtifact { distribution, path });
        }
    }
    Ok(out)
}
