//! Layered evaluation of compiled justifications.
//!
//! The walk is a predecessor-complete BFS: a node is enqueued only once
//! every one of its predecessors has been processed, which is stricter
//! than an arbitrary topological order and guarantees that predecessor
//! statuses are always materialised when a node is reached.  Statuses
//! live in a per-run overlay; the compiled diagram itself is never
//! written to.

use std::collections::VecDeque;

use crate::compile::CompiledJustification;
use crate::defs::{Status, VariableKind};
use crate::diag::RunnerError;
use crate::graph::NodeId;
use crate::report::Reporter;
use crate::runtime::Runtime;
use crate::util::sanitize_label;

/// Outcome of one node, in traversal order.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    pub name: String,
    pub kind: VariableKind,
    pub label: String,
    pub status: Status,
    /// Present only on `FAIL`, carrying the procedure failure.
    pub error: Option<RunnerError>,
}

/// Totals of one diagram run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Verdict {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// True when every node passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.passed > 0
    }

    fn record(&mut self, status: Status) {
        match status {
            Status::Pass => self.passed += 1,
            Status::Fail => self.failed += 1,
            Status::Skip => self.skipped += 1,
        }
    }
}

/// Options for one evaluation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip every node instead of calling procedures.
    pub dry_run: bool,
}

/// Evaluate one diagram, emitting a node event per node to `reporter`
/// and returning the run totals.
pub fn evaluate(
    diagram: &CompiledJustification,
    runtime: &mut dyn Runtime,
    options: RunOptions,
    reporter: &mut dyn Reporter,
) -> Verdict {
    let dag = &diagram.dag;
    let mut statuses: Vec<Option<Status>> = vec![None; dag.len()];
    let mut visited = vec![false; dag.len()];
    let mut verdict = Verdict::default();

    // Frontier: the evidences, in declaration order.
    let mut queue: VecDeque<NodeId> = dag
        .nodes()
        .filter(|&(id, _)| dag.in_degree(id) == 0)
        .map(|(id, _)| id)
        .collect();

    while let Some(id) = queue.pop_front() {
        if visited[id] {
            continue;
        }
        let (status, error) = process_node(diagram, id, &statuses, runtime, options);
        statuses[id] = Some(status);
        verdict.record(status);
        visited[id] = true;

        let node = dag.node(id);
        reporter.node(&NodeEvent {
            name: node.name.clone(),
            kind: node.kind,
            label: node.label.clone(),
            status,
            error,
        });

        for &succ in dag.successors(id) {
            if !visited[succ] && dag.predecessors(succ).iter().all(|&p| visited[p]) {
                queue.push_back(succ);
            }
        }
    }

    // The compiler rejects diagrams with unreachable regions.
    assert!(
        visited.iter().all(|&seen| seen),
        "diagram {} contains an unreachable region",
        diagram.name
    );
    verdict
}

fn process_node(
    diagram: &CompiledJustification,
    id: NodeId,
    statuses: &[Option<Status>],
    runtime: &mut dyn Runtime,
    options: RunOptions,
) -> (Status, Option<RunnerError>) {
    let dag = &diagram.dag;
    let node = dag.node(id);

    let blocked = dag
        .predecessors(id)
        .iter()
        .any(|&p| statuses[p] != Some(Status::Pass));
    if options.dry_run || blocked {
        return (Status::Skip, None);
    }

    match node.kind {
        VariableKind::Evidence | VariableKind::Strategy => {
            let procedure = sanitize_label(&node.label);
            match runtime.call(&procedure, &[]) {
                Err(err) => (Status::Fail, Some(err)),
                Ok(value) if !value.is_truthy() => (
                    Status::Fail,
                    Some(RunnerError::Function(format!(
                        "{} returns non-true result: {}",
                        procedure, value
                    ))),
                ),
                Ok(_) => (Status::Pass, None),
            }
        }
        // Sub-conclusions and the conclusion hold once every predecessor
        // passed; no procedure is attached to them.
        VariableKind::SubConclusion | VariableKind::Conclusion => (Status::Pass, None),
        VariableKind::Support => {
            unreachable!("@support nodes are rejected by the compiler")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use crate::loader;
    use crate::report::Recorder;
    use crate::runtime::{Library, LibraryRegistry, LibraryRuntime, Value};

    const DIAMOND: &str = "justification D {\n\
         evidence e1 : \"A\"\n\
         evidence e2 : \"B\"\n\
         strategy s : \"S\"\n\
         conclusion c : \"C\"\n\
         e1 supports s\n\
         e2 supports s\n\
         s supports c\n\
         }";

    fn compiled(source: &str) -> crate::compile::CompiledJustification {
        let model = loader::parse_source(source).unwrap();
        compile::compile_model(&model).unwrap().remove(0)
    }

    fn runtime_returning(values: &[(&str, Value)]) -> LibraryRuntime {
        let mut library = Library::new("checks");
        for (name, value) in values {
            let value = value.clone();
            library = library.procedure(name, move |_, _| Ok(value.clone()));
        }
        let mut runtime = LibraryRuntime::new(LibraryRegistry::new());
        runtime.push_library(library);
        runtime
    }

    #[test]
    fn strategies_wait_for_every_predecessor() {
        let diagram = compiled(DIAMOND);
        let mut runtime = runtime_returning(&[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(true)),
            ("s", Value::Bool(true)),
        ]);
        let mut recorder = Recorder::default();
        let verdict = evaluate(
            &diagram,
            &mut runtime,
            RunOptions::default(),
            &mut recorder,
        );

        let order: Vec<&str> = recorder.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["e1", "e2", "s", "c"]);
        assert_eq!(verdict.passed, 4);
        assert!(verdict.all_passed());
    }

    #[test]
    fn one_failing_evidence_skips_the_strategy() {
        let diagram = compiled(DIAMOND);
        let mut runtime = runtime_returning(&[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(false)),
            ("s", Value::Bool(true)),
        ]);
        let mut recorder = Recorder::default();
        let verdict = evaluate(
            &diagram,
            &mut runtime,
            RunOptions::default(),
            &mut recorder,
        );

        let statuses: Vec<Status> = recorder.events.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![Status::Pass, Status::Fail, Status::Skip, Status::Skip]
        );
        assert_eq!(verdict.failed, 1);
        assert!(!verdict.all_passed());
    }

    #[test]
    fn dry_run_skips_everything() {
        let diagram = compiled(DIAMOND);
        // No procedures loaded at all; a dry run must not call any.
        let mut runtime = LibraryRuntime::new(LibraryRegistry::new());
        let mut recorder = Recorder::default();
        let verdict = evaluate(
            &diagram,
            &mut runtime,
            RunOptions { dry_run: true },
            &mut recorder,
        );

        assert_eq!(verdict.skipped, 4);
        assert!(recorder.events.iter().all(|e| e.status == Status::Skip));
    }

    #[test]
    fn missing_procedures_fail_their_node() {
        let diagram = compiled(DIAMOND);
        let mut runtime = runtime_returning(&[("a", Value::Bool(true))]);
        let mut recorder = Recorder::default();
        evaluate(
            &diagram,
            &mut runtime,
            RunOptions::default(),
            &mut recorder,
        );

        let e2 = &recorder.events[1];
        assert_eq!(e2.status, Status::Fail);
        let err = e2.error.as_ref().unwrap();
        assert_eq!(err.kind(), crate::diag::ErrorKind::Runtime);
        assert!(err.message().contains("`b`"));
    }
}
