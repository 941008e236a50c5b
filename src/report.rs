//! The reporting boundary.
//!
//! The evaluator pushes one [`NodeEvent`](crate::evaluate::NodeEvent)
//! per node, bracketed by begin/end notifications carrying the diagram
//! name and its totals.  Consumers implement [`Reporter`]; the crate
//! ships a `log`-backed reporter for the CLI and a recording reporter
//! for tests and programmatic use.

use log::{info, warn};

use crate::defs::Status;
use crate::evaluate::{NodeEvent, Verdict};

/// Consumer of the evaluator's event stream.
pub trait Reporter {
    fn begin_diagram(&mut self, _name: &str) {}

    fn node(&mut self, event: &NodeEvent);

    fn end_diagram(&mut self, _name: &str, _verdict: &Verdict) {}
}

/// Reporter that writes through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn begin_diagram(&mut self, name: &str) {
        info!("justifying diagram {}", name);
    }

    fn node(&mut self, event: &NodeEvent) {
        match (&event.status, &event.error) {
            (Status::Fail, Some(err)) => {
                warn!("[{}] {} ({}): {}", event.status, event.name, event.label, err)
            }
            (Status::Fail, None) => warn!("[{}] {} ({})", event.status, event.name, event.label),
            _ => info!("[{}] {} ({})", event.status, event.name, event.label),
        }
    }

    fn end_diagram(&mut self, name: &str, verdict: &Verdict) {
        info!(
            "diagram {}: {} passed, {} failed, {} skipped",
            name, verdict.passed, verdict.failed, verdict.skipped
        );
    }
}

/// Reporter that records every event.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<NodeEvent>,
    pub verdicts: Vec<(String, Verdict)>,
}

impl Reporter for Recorder {
    fn node(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }

    fn end_diagram(&mut self, name: &str, verdict: &Verdict) {
        self.verdicts.push((name.to_owned(), *verdict));
    }
}
