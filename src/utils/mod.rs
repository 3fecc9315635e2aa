//! Utilities shared by the tuning layer.

pub mod benchmark;

pub use benchmark::ForagingBenchmark;
