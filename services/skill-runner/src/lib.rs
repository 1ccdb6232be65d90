//! Configuration-driven batch skill assessment.
//!
//! Loads a YAML configuration naming observation and model-result files,
//! reads them as CSV, matches every observation with every model result
//! and reports skill.

pub mod config;
pub mod csv_reader;
pub mod run;

pub use config::{load_config, parse_config, RunnerConfig};
pub use csv_reader::CsvReader;
pub use run::{match_from_config, run, RunOptions};
