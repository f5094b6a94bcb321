//! # EvictLib
//!
//! Evictlib is a library for benchmarking cache replacement policies against synthesized access
//! workloads
//!
//! It takes a finite population of records, measures how skewed the population is, expands a
//! sample of it into a heavy-tailed and a uniform access sequence, and replays each sequence
//! against a bounded cache which fronts a key-value backing store, counting hits and misses per
//! policy
//!
//! Every external collaborator (the record population, the backing store) sits behind a trait so
//! runs can be isolated and tests can use in-memory fakes

/// Analysis of the record population: group frequencies, the long-tail head and the even selection
pub mod analyzer;

/// Contains the benchmark driver, which runs the prepare stage and every (policy, distribution)
/// pair
pub mod benchmark;

/// Contains the recency index used by the least recently used policy
pub mod cache;

/// Contains definitions for the JSON configuration format
pub mod config;

/// The error type shared by every stage
pub mod error;

/// Reading and writing of the persisted artifacts
pub mod io;

/// The record model
pub mod record;

/// Contains the provided replacement policies, with a trait for implementing custom policies
pub mod replacement_policies;

/// Summary reports and result tables
pub mod report;

/// Contains the simulator used to replay one workload against one policy
pub mod simulator;

/// Record sources, the population the workloads are drawn from
pub mod source;

/// Backing stores, the external key-value system the simulated cache writes to
pub mod store;

/// Workload synthesis from a record sample
pub mod workload;

#[cfg(test)]
mod test;

/// Contains utilities for locating artifacts on disk.
pub mod util;

pub use error::{Error, Result};
