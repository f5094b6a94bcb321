use crate::config::SimulationConfig;
use crate::record::Record;
use crate::workload::Workload;

mod policies;

pub(crate) type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

pub(crate) fn record(id: u64, group: &str) -> Record {
    Record::new(id, Some(group)).with_field("title", format!("event {id}"))
}

/// One access per id, group taken from the id's parity
pub(crate) fn sequence(ids: &[u64]) -> Workload {
    ids.iter()
        .map(|&id| record(id, if id % 2 == 0 { "even street" } else { "odd street" }))
        .collect::<Vec<_>>()
        .into()
}

/// Replays workloads in the order given, with a fixed seed
pub(crate) fn fixed_order(max_keys: usize) -> SimulationConfig {
    SimulationConfig {
        max_keys,
        seed: Some(7),
        shuffle: false,
    }
}

/// `groups` lists (group, record count); ids are assigned consecutively from 1
pub(crate) fn population(groups: &[(&str, usize)]) -> Vec<Record> {
    let mut records = Vec::new();
    for (group, count) in groups {
        for _ in 0..*count {
            records.push(record(records.len() as u64 + 1, group));
        }
    }
    records
}
