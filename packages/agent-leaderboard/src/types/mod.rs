//! Data types shared across the pipeline.

pub mod config;
pub mod ranking;
pub mod record;
pub mod run;
