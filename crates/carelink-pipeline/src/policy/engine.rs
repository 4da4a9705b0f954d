use std::collections::BTreeMap;

use carelink_core::error::Result;
use carelink_core::CanonicalEvent;

use crate::config::PolicySpec;

use super::predicates::{compile_policies, CompiledPolicy};

/// Decision from policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResult {
    pub allowed: bool,
    pub reason: String,
    /// `policy`/`index` on deny, `policies_checked` on allow.
    pub metadata: BTreeMap<String, String>,
}

impl PolicyResult {
    /// Name of the violating policy, if denied.
    pub fn violator(&self) -> Option<&str> {
        if self.allowed {
            return None;
        }
        self.metadata.get("policy").map(String::as_str)
    }
}

/// Ordered policy chain.
/// Construct once at startup, then share by reference.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    policies: Vec<CompiledPolicy>,
}

impl PolicyGate {
    pub fn new(specs: &[PolicySpec]) -> Result<Self> {
        let policies = compile_policies(specs)?;
        if policies.is_empty() {
            tracing::warn!("policy chain is empty; every event will be allowed");
        }
        Ok(Self { policies })
    }

    /// Policy names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Run the chain in declaration order; the first failing policy is the violator.
    pub fn evaluate(&self, ev: &CanonicalEvent) -> PolicyResult {
        for (index, policy) in self.policies.iter().enumerate() {
            if let Some(reason) = policy.violation(ev) {
                let mut metadata = BTreeMap::new();
                metadata.insert("policy".to_string(), policy.name.clone());
                metadata.insert("index".to_string(), index.to_string());
                return PolicyResult {
                    allowed: false,
                    reason: format!("{}: {reason}", policy.name),
                    metadata,
                };
            }
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("policies_checked".to_string(), self.policies.len().to_string());
        PolicyResult {
            allowed: true,
            reason: "all policies passed".to_string(),
            metadata,
        }
    }
}
