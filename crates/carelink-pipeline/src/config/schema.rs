use std::collections::HashSet;

use serde::Deserialize;

use carelink_core::error::{CarelinkError, Result};
use carelink_core::EventType;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub version: u32,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub processing: ProcessingSection,

    /// Ordered policy chain; declaration order is evaluation order.
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicySpec>,

    #[serde(default)]
    pub eval: Option<EvalSection>,

    #[serde(default)]
    pub handoff: Option<HandoffSection>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CarelinkError::UnsupportedVersion(self.version));
        }

        self.queue.validate()?;
        self.processing.validate()?;

        let mut names = HashSet::new();
        for p in &self.policies {
            p.validate()?;
            if !names.insert(p.name()) {
                return Err(CarelinkError::Config(format!(
                    "duplicate policy name: {}",
                    p.name()
                )));
            }
        }

        if let Some(h) = &self.handoff {
            if h.path.trim().is_empty() {
                return Err(CarelinkError::Config("handoff.path must not be empty".into()));
            }
        }
        if let Some(e) = &self.eval {
            if e.suite.trim().is_empty() {
                return Err(CarelinkError::Config("eval.suite must not be empty".into()));
            }
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            queue: QueueSection::default(),
            processing: ProcessingSection::default(),
            policies: default_policies(),
            eval: None,
            handoff: None,
        }
    }
}

/// What to do with an item when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the new item; its id is not remembered.
    #[default]
    Reject,
    /// Shed the oldest waiting item to make room.
    DropOldest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSection {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

impl QueueSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000_000).contains(&self.capacity) {
            return Err(CarelinkError::Config(
                "queue.capacity must be between 1 and 1000000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingSection {
    /// Per-message downstream delivery deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

impl ProcessingSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=600_000).contains(&self.timeout_ms) {
            return Err(CarelinkError::Config(
                "processing.timeout_ms must be between 1 and 600000".into(),
            ));
        }
        if self.dead_letter_capacity == 0 {
            return Err(CarelinkError::Config(
                "processing.dead_letter_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Canonical event fields a policy can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventField {
    Id,
    PatientId,
    FacilityId,
    Timestamp,
}

impl EventField {
    pub fn as_str(self) -> &'static str {
        match self {
            EventField::Id => "id",
            EventField::PatientId => "patient_id",
            EventField::FacilityId => "facility_id",
            EventField::Timestamp => "timestamp",
        }
    }
}

/// One declared policy. `kind` selects the predicate.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PolicySpec {
    RequiredField { name: String, field: EventField },
    AllowedTypes { name: String, types: Vec<EventType> },
    FacilityAllowlist { name: String, facilities: Vec<String> },
    MaxPayloadBytes { name: String, max_bytes: usize },
}

impl PolicySpec {
    pub fn name(&self) -> &str {
        match self {
            PolicySpec::RequiredField { name, .. }
            | PolicySpec::AllowedTypes { name, .. }
            | PolicySpec::FacilityAllowlist { name, .. }
            | PolicySpec::MaxPayloadBytes { name, .. } => name,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name().trim().is_empty() {
            return Err(CarelinkError::Config("policy name must not be empty".into()));
        }
        match self {
            PolicySpec::AllowedTypes { types, .. } if types.is_empty() => Err(CarelinkError::Config(
                format!("policy {}: types must not be empty", self.name()),
            )),
            PolicySpec::FacilityAllowlist { facilities, .. } if facilities.is_empty() => {
                Err(CarelinkError::Config(format!(
                    "policy {}: facilities must not be empty",
                    self.name()
                )))
            }
            PolicySpec::MaxPayloadBytes { max_bytes: 0, .. } => Err(CarelinkError::Config(format!(
                "policy {}: max_bytes must be at least 1",
                self.name()
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalSection {
    /// Path of the eval suite YAML.
    pub suite: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffSection {
    /// Well-known path the last delivered event is written to.
    pub path: String,
}

fn default_queue_capacity() -> usize {
    10_000
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_dead_letter_capacity() -> usize {
    1000
}

pub fn default_policies() -> Vec<PolicySpec> {
    vec![
        PolicySpec::RequiredField {
            name: "patient_id_present".into(),
            field: EventField::PatientId,
        },
        PolicySpec::RequiredField {
            name: "facility_id_present".into(),
            field: EventField::FacilityId,
        },
        PolicySpec::MaxPayloadBytes {
            name: "payload_size".into(),
            max_bytes: 64 * 1024,
        },
    ]
}
