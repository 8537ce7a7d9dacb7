//! Library side of the benchtop CLI (exposed for integration tests).

pub mod cli;
pub mod report;
pub mod runner;
