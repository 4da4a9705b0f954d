//! Policy predicate compilation and checking.
//!
//! Each declared `PolicySpec` becomes a `CompiledPolicy`; `violation` returns
//! the reason the event fails the predicate, or `None` when it passes.

use carelink_core::error::Result;
use carelink_core::{CanonicalEvent, EventType};

use crate::config::{EventField, PolicySpec};

/// Compiled predicate body.
#[derive(Debug, Clone)]
pub enum Check {
    Required(EventField),
    AllowedTypes(Vec<EventType>),
    Facilities(Vec<String>),
    MaxPayloadBytes(usize),
}

/// Named predicate, ready to evaluate.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub name: String,
    pub check: Check,
}

pub fn compile_policies(raw: &[PolicySpec]) -> Result<Vec<CompiledPolicy>> {
    let mut out = Vec::with_capacity(raw.len());
    for spec in raw {
        spec.validate()?;
        let check = match spec {
            PolicySpec::RequiredField { field, .. } => Check::Required(*field),
            PolicySpec::AllowedTypes { types, .. } => Check::AllowedTypes(types.clone()),
            PolicySpec::FacilityAllowlist { facilities, .. } => Check::Facilities(facilities.clone()),
            PolicySpec::MaxPayloadBytes { max_bytes, .. } => Check::MaxPayloadBytes(*max_bytes),
        };
        out.push(CompiledPolicy {
            name: spec.name().to_string(),
            check,
        });
    }
    Ok(out)
}

impl CompiledPolicy {
    pub fn violation(&self, ev: &CanonicalEvent) -> Option<String> {
        match &self.check {
            Check::Required(field) => {
                if field_present(ev, *field) {
                    None
                } else {
                    Some(format!("missing {}", field.as_str()))
                }
            }
            Check::AllowedTypes(types) => {
                if types.contains(&ev.event_type) {
                    None
                } else {
                    Some(format!("event type {} not allowed", ev.event_type.as_str()))
                }
            }
            Check::Facilities(facilities) => {
                if facilities.iter().any(|f| f == &ev.facility_id) {
                    None
                } else {
                    Some(format!("facility {:?} not allowed", ev.facility_id))
                }
            }
            Check::MaxPayloadBytes(max) => {
                let size = ev.payload_size();
                if size <= *max {
                    None
                } else {
                    Some(format!("payload {size} bytes exceeds {max}"))
                }
            }
        }
    }
}

fn field_present(ev: &CanonicalEvent, field: EventField) -> bool {
    match field {
        EventField::Id => !ev.id.trim().is_empty(),
        EventField::PatientId => !ev.patient_id.trim().is_empty(),
        EventField::FacilityId => !ev.facility_id.trim().is_empty(),
        EventField::Timestamp => ev.timestamp.is_some(),
    }
}
