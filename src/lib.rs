pub mod benchmarks;
pub mod benchstat;
pub mod command;
pub mod config;
pub mod error;
pub mod git;
pub mod path_utils;
pub mod report;
