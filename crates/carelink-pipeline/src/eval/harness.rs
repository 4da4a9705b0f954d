use std::fmt;

use carelink_core::error::{CarelinkError, Result};

use super::rule::{Payload, Rule};
use super::suite::EvalTask;

/// Per-task result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub name: String,
    pub expected: bool,
    pub actual: bool,
    pub passed: bool,
}

/// Suite result. `rollback` is set when any task failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvalReport {
    pub passed: usize,
    pub failed: usize,
    pub rollback: bool,
    pub outcomes: Vec<TaskOutcome>,
}

impl EvalReport {
    /// Names of failed tasks, in suite order.
    pub fn failures(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.name.as_str())
            .collect()
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PASS={} FAIL={} rollback={}", self.passed, self.failed, self.rollback)
    }
}

struct CompiledTask {
    name: String,
    rule: Rule,
    expect: bool,
}

/// Compiled, reusable suite.
pub struct EvalHarness {
    tasks: Vec<CompiledTask>,
}

impl EvalHarness {
    /// Compile every rule up front; one bad rule rejects the whole suite.
    pub fn new(tasks: &[EvalTask]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(tasks.len());
        for t in tasks {
            let rule = Rule::parse(&t.rule)
                .map_err(|e| CarelinkError::Config(format!("eval task {}: {e}", t.name)))?;
            compiled.push(CompiledTask {
                name: t.name.clone(),
                rule,
                expect: t.expect,
            });
        }
        Ok(Self { tasks: compiled })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Evaluate every task in order against `payload`.
    pub fn run(&self, payload: &str) -> EvalReport {
        let payload = Payload::new(payload);
        let mut report = EvalReport::default();

        for t in &self.tasks {
            let actual = t.rule.matches(&payload);
            let passed = actual == t.expect;
            if passed {
                report.passed += 1;
            } else {
                report.failed += 1;
                tracing::warn!(task = %t.name, expected = t.expect, actual, "eval task failed");
            }
            report.outcomes.push(TaskOutcome {
                name: t.name.clone(),
                expected: t.expect,
                actual,
                passed,
            });
        }

        report.rollback = report.failed > 0;
        tracing::info!(passed = report.passed, failed = report.failed, rollback = report.rollback, "eval complete");
        report
    }
}
