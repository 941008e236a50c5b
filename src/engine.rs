//! Main API entry point for loading and justifying diagrams.
//!
//! A variable of type `Engine` represents an assembled model.  You can
//! construct an `Engine` object, then load one or more JD files into it
//! with `load_file`, then query analysis results which are computed on
//! demand.  The only analysis pass today is compilation, which
//! materialises and validates every justification class; further loads
//! invalidate it, and it is rerun when next requested.
//!
//! Evaluation is not a pass: it does not touch the model or the compiled
//! diagrams.  Each `justify` call forks the supplied runtime, walks the
//! diagram on a fresh status overlay, and streams node events to the
//! reporter, so diagrams can be justified any number of times and in any
//! order against the same engine.

use std::path::Path;
use std::time::Instant;

use log::debug;

use crate::compile::{self, CompiledJustification};
use crate::diag::RunnerError;
use crate::evaluate::{self, RunOptions, Verdict};
use crate::loader;
use crate::model::ModelDef;
use crate::report::Reporter;
use crate::runtime::Runtime;

/// Options that affect engine processing, constant for the lifetime of
/// the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// If true, wall time is logged after the completion of each pass.
    pub timing: bool,
}

fn time<R, F: FnOnce() -> R>(options: &EngineOptions, name: &str, f: F) -> R {
    let now = Instant::now();
    let ret = f();
    if options.timing {
        debug!("{} {}ms", name, now.elapsed().as_millis());
    }
    ret
}

/// Master container: the merged model plus lazily computed analysis
/// results.
#[derive(Debug, Default)]
pub struct Engine {
    options: EngineOptions,
    model: ModelDef,
    justifications: Option<Vec<CompiledJustification>>,
}

impl Engine {
    /// Constructs a new engine with an empty model.  Use `load_file` or
    /// `load_model` to fill it.
    pub fn new(options: EngineOptions) -> Engine {
        Engine {
            options,
            model: ModelDef::default(),
            justifications: None,
        }
    }

    /// Load a JD file, following its `load` statements transitively, and
    /// merge the result into the model.  First definition wins on class
    /// name collisions.  Invalidates the compile pass.
    pub fn load_file(&mut self, path: &Path) -> Result<(), RunnerError> {
        let options = self.options;
        let model = time(&options, "load", || loader::load_file(path))?;
        self.model.update(model);
        self.justifications = None;
        Ok(())
    }

    /// Merge an already-built model, e.g. from JSON ingestion.
    /// Invalidates the compile pass.
    pub fn load_model(&mut self, model: ModelDef) {
        self.model.update(model);
        self.justifications = None;
    }

    /// The merged model, read-only.
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// Compile pass: materialise and validate every justification class.
    /// The result is cached until the model changes.
    pub fn compile_pass(&mut self) -> Result<&[CompiledJustification], RunnerError> {
        if self.justifications.is_none() {
            let options = self.options;
            let compiled = time(&options, "compile", || compile::compile_model(&self.model))?;
            self.justifications = Some(compiled);
        }
        Ok(self.justifications.as_deref().unwrap_or_default())
    }

    /// Names of the compiled diagrams, in declaration order.
    pub fn diagram_names(&mut self) -> Result<Vec<String>, RunnerError> {
        Ok(self
            .compile_pass()?
            .iter()
            .map(|j| j.name.clone())
            .collect())
    }

    /// Get a compiled diagram by name.
    pub fn diagram(&mut self, name: &str) -> Result<&CompiledJustification, RunnerError> {
        if self.compile_pass()?.iter().all(|j| j.name != name) {
            // Pattern and composition classes exist in the model but have
            // no executable semantics.
            return Err(match self.model.class(name) {
                Some(class) => RunnerError::Unsupported(format!(
                    "{} classes cannot be evaluated: `{}`",
                    class.kind, name
                )),
                None => {
                    RunnerError::NotFound(format!("no justification diagram named `{}`", name))
                }
            });
        }
        let found = self.compile_pass()?.iter().find(|j| j.name == name);
        found.ok_or_else(|| {
            RunnerError::NotFound(format!("no justification diagram named `{}`", name))
        })
    }

    /// Evaluate one diagram on a fork of `runtime`, streaming node
    /// events to `reporter` and returning the run totals.
    pub fn justify(
        &mut self,
        name: &str,
        runtime: &dyn Runtime,
        options: RunOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Verdict, RunnerError> {
        let engine_options = self.options;
        let diagram = self.diagram(name)?;
        let mut run = runtime.fork();
        reporter.begin_diagram(name);
        let verdict = time(&engine_options, "justify", || {
            evaluate::evaluate(diagram, run.as_mut(), options, reporter)
        });
        reporter.end_diagram(name, &verdict);
        Ok(verdict)
    }
}
