//! Finds which groups of the population make up its head and which behave evenly
//!
//! Both selections are computed from group frequencies over the full population. Records without a
//! group are left out of the frequencies entirely

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::config::{DistributionKind, DEFAULT_EVEN_FRACTION, DEFAULT_HEAD_FRACTION};
use crate::error::Result;
use crate::record::Record;
use crate::source::RecordSource;

/// How many records of the population belong to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFrequency {
    pub group: String,
    pub count: usize,
}

/// Statistics describing a selection relative to the whole population
///
/// Ratios are `None` when their denominator is zero, which only happens for an empty population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub distinct_groups: usize,
    pub groups_selected: usize,
    pub percent_groups_selected: Option<f64>,
    pub total_records: usize,
    pub records_selected: usize,
    pub percent_records_selected: Option<f64>,
    pub mean_per_group: Option<f64>,
}

/// The groups chosen for one distribution, with every record belonging to them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSelection {
    pub kind: DistributionKind,
    pub groups: Vec<String>,
    pub records: Vec<Record>,
    pub stats: SelectionStats,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Analyzer {
    /// Share of all records the long-tail head must cover
    pub head_fraction: f64,
    /// Share of all groups the even selection keeps
    pub even_fraction: f64,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            head_fraction: DEFAULT_HEAD_FRACTION,
            even_fraction: DEFAULT_EVEN_FRACTION,
        }
    }
}

/// Counts records per group, in order of each group's first appearance
pub fn group_frequencies(records: &[Record]) -> Vec<GroupFrequency> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut frequencies: Vec<GroupFrequency> = Vec::new();
    for group in records.iter().filter_map(|r| r.group.as_deref()) {
        match positions.get(group) {
            Some(&index) => frequencies[index].count += 1,
            None => {
                positions.insert(group, frequencies.len());
                frequencies.push(GroupFrequency { group: group.to_owned(), count: 1 });
            }
        }
    }
    frequencies
}

/// The smallest prefix of groups, by descending count, whose records reach `fraction` of the total
///
/// Ties keep their input order
///
/// # Examples
///
/// ```
/// use evictlib::analyzer::{long_tail_groups, GroupFrequency};
/// let frequencies = vec![
///     GroupFrequency { group: "a".into(), count: 1 },
///     GroupFrequency { group: "b".into(), count: 7 },
///     GroupFrequency { group: "c".into(), count: 2 },
/// ];
/// assert_eq!(long_tail_groups(&frequencies, 0.8), vec!["b".to_string(), "c".to_string()]);
/// ```
pub fn long_tail_groups(frequencies: &[GroupFrequency], fraction: f64) -> Vec<String> {
    let mut ordered: Vec<&GroupFrequency> = frequencies.iter().collect();
    ordered.sort_by(|a, b| b.count.cmp(&a.count));
    let total: usize = frequencies.iter().map(|f| f.count).sum();
    let threshold = total as f64 * fraction;
    let mut cumulative = 0;
    let mut head = Vec::new();
    for frequency in ordered {
        head.push(frequency.group.clone());
        cumulative += frequency.count;
        if cumulative as f64 >= threshold {
            break;
        }
    }
    head
}

/// The `ceil(fraction * groups)` groups whose count deviates least from the mean count
///
/// Ties keep their input order
pub fn even_groups(frequencies: &[GroupFrequency], fraction: f64) -> Vec<String> {
    if frequencies.is_empty() {
        return Vec::new();
    }
    let mean = mean_per_group(frequencies);
    let mut ordered: Vec<(f64, &GroupFrequency)> = frequencies
        .iter()
        .map(|f| ((f.count as f64 - mean).abs(), f))
        .collect();
    ordered.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    let size = even_selection_size(frequencies.len(), fraction);
    ordered.into_iter().take(size).map(|(_, f)| f.group.clone()).collect()
}

/// How many groups the even selection holds for `distinct_groups` groups
pub fn even_selection_size(distinct_groups: usize, fraction: f64) -> usize {
    ((distinct_groups as f64 * fraction).ceil() as usize).min(distinct_groups)
}

fn mean_per_group(frequencies: &[GroupFrequency]) -> f64 {
    let total: usize = frequencies.iter().map(|f| f.count).sum();
    total as f64 / frequencies.len() as f64
}

fn ratio(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

impl Analyzer {
    pub fn new(head_fraction: f64, even_fraction: f64) -> Self {
        Self { head_fraction, even_fraction }
    }

    /// Selects the long-tail head from the source
    pub fn compute_long_tail<S: RecordSource + ?Sized>(&self, source: &mut S) -> Result<DistributionSelection> {
        self.compute(DistributionKind::LongTail, source)
    }

    /// Selects the even groups from the source
    pub fn compute_even<S: RecordSource + ?Sized>(&self, source: &mut S) -> Result<DistributionSelection> {
        self.compute(DistributionKind::Even, source)
    }

    pub fn compute<S: RecordSource + ?Sized>(&self, kind: DistributionKind, source: &mut S) -> Result<DistributionSelection> {
        let population = source.fetch_all()?;
        let frequencies = group_frequencies(&population);
        let groups = match kind {
            DistributionKind::LongTail => long_tail_groups(&frequencies, self.head_fraction),
            DistributionKind::Even => even_groups(&frequencies, self.even_fraction),
        };
        let records = if groups.is_empty() {
            Vec::new()
        } else {
            source.fetch_where(&groups.iter().cloned().collect::<HashSet<_>>())?
        };
        let total_records: usize = frequencies.iter().map(|f| f.count).sum();
        let stats = SelectionStats {
            distinct_groups: frequencies.len(),
            groups_selected: groups.len(),
            percent_groups_selected: ratio(groups.len(), frequencies.len()),
            total_records,
            records_selected: records.len(),
            percent_records_selected: ratio(records.len(), total_records),
            mean_per_group: (!frequencies.is_empty()).then(|| mean_per_group(&frequencies)),
        };
        info!(
            distribution = %kind,
            groups = stats.groups_selected,
            distinct_groups = stats.distinct_groups,
            records = stats.records_selected,
            "selected groups"
        );
        Ok(DistributionSelection { kind, groups, records, stats })
    }
}
