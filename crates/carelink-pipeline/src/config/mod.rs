//! Pipeline config loader (strict parsing).

pub mod schema;

use std::fs;

use carelink_core::error::{CarelinkError, Result};

pub use schema::{
    EvalSection, EventField, HandoffSection, OverflowPolicy, PipelineConfig, PolicySpec,
    ProcessingSection, QueueSection,
};

pub fn load_from_file(path: &str) -> Result<PipelineConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| CarelinkError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PipelineConfig> {
    let cfg: PipelineConfig = serde_yaml::from_str(s)
        .map_err(|e| CarelinkError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
