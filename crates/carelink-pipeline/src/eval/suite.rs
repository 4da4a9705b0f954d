//! Eval suite loader (strict parsing).

use std::collections::HashSet;
use std::fs;

use serde::Deserialize;

use carelink_core::error::{CarelinkError, Result};

/// One declared task.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalTask {
    pub name: String,
    pub rule: String,
    pub expect: bool,
}

impl EvalTask {
    pub fn new(name: impl Into<String>, rule: impl Into<String>, expect: bool) -> Self {
        Self {
            name: name.into(),
            rule: rule.into(),
            expect,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalSuite {
    pub version: u32,

    /// Fixed payload; when absent the caller supplies one (e.g. a hand-off event).
    #[serde(default)]
    pub payload: Option<String>,

    pub tasks: Vec<EvalTask>,
}

impl EvalSuite {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CarelinkError::UnsupportedVersion(self.version));
        }
        if self.tasks.is_empty() {
            return Err(CarelinkError::Config("eval tasks must not be empty".into()));
        }
        let mut names = HashSet::new();
        for t in &self.tasks {
            if t.name.trim().is_empty() {
                return Err(CarelinkError::Config("eval task name must not be empty".into()));
            }
            if !names.insert(t.name.as_str()) {
                return Err(CarelinkError::Config(format!("duplicate eval task name: {}", t.name)));
            }
        }
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| CarelinkError::Config(format!("read eval suite {path} failed: {e}")))?;
        Self::load_from_str(&s)
    }

    pub fn load_from_str(s: &str) -> Result<Self> {
        let suite: EvalSuite = serde_yaml::from_str(s)
            .map_err(|e| CarelinkError::Config(format!("invalid eval yaml: {e}")))?;
        suite.validate()?;
        Ok(suite)
    }
}
