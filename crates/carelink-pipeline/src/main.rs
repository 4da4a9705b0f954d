//! carelink pipeline runner.
//!
//! - Reads messages from stdin, separated by blank lines
//!   (a message starting with `{` is JSON intake, anything else HL7 v2)
//! - Ingests, drains and reports the batch
//! - Runs the configured eval suite; exit code 2 when it asks for rollback

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use carelink_core::error::Result;
use carelink_core::RawMessage;
use carelink_pipeline::dispatch::{DownstreamSink, HandoffSink, LogSink};
use carelink_pipeline::eval::{EvalHarness, EvalSuite};
use carelink_pipeline::{config, handoff, Pipeline};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "carelink.yaml".into());
    let cfg = config::load_from_file(&path)?;

    let sink: Arc<dyn DownstreamSink> = match &cfg.handoff {
        Some(h) => Arc::new(HandoffSink::new(&h.path)),
        None => Arc::new(LogSink::new()),
    };
    let pipeline = Pipeline::new(&cfg, sink)?;

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    for raw in split_messages(&input) {
        pipeline.ingest(&raw);
    }
    let report = pipeline.process_all().await;
    println!(
        "processed={} delivered={} violations={} failed={}",
        report.processed, report.delivered, report.violations, report.failed
    );
    tracing::debug!(metrics = ?pipeline.metrics().snapshot(), "metrics snapshot");

    let Some(eval) = &cfg.eval else {
        return Ok(ExitCode::SUCCESS);
    };
    let suite = EvalSuite::load_from_file(&eval.suite)?;
    let payload = match (&suite.payload, &cfg.handoff) {
        (Some(p), _) => p.clone(),
        (None, Some(h)) => match handoff::read_event(Path::new(&h.path))? {
            Some(ev) => ev.to_json()?,
            None => String::new(),
        },
        (None, None) => String::new(),
    };

    let result = EvalHarness::new(&suite.tasks)?.run(&payload);
    println!("{result}");
    Ok(if result.rollback { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

fn split_messages(input: &str) -> Vec<RawMessage> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in input.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !current.is_empty() {
                let text = current.join("\r");
                let raw = if text.trim_start().starts_with('{') {
                    RawMessage::json(current.join("\n"))
                } else {
                    RawMessage::hl7(text)
                };
                out.push(raw);
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    out
}
