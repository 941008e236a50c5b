//! Model loading.
//!
//! Reads JD source from disk, drives parse + transform, and follows
//! `load` statements transitively.  Load paths are resolved relative to
//! the importing file and canonicalised before bookkeeping: a file that
//! is an ancestor of itself is a cycle, a file already merged through a
//! different route is skipped, so diamond imports merge once.
//!
//! A second entry accepts a JSON object mirroring the model shape; it
//! records `load` statements but does not traverse them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fnv::FnvHashSet;
use serde_json::Value as Json;

use crate::defs::{ClassKind, VariableKind};
use crate::diag::RunnerError;
use crate::model::{
    ClassBody, ClassDef, CompositionDef, JustificationDef, LoadStmt, ModelDef, SupportDef,
    VariableDef,
};
use crate::transform;

/// Parse a single JD buffer without following `load` statements.
pub fn parse_source(source: &str) -> Result<ModelDef, RunnerError> {
    transform::model_from_source(source)
}

/// Read and parse one file, without following `load` statements.
pub fn parse_file(path: &Path) -> Result<ModelDef, RunnerError> {
    let source = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    parse_source(&source)
}

/// Load a JD file and everything it transitively `load`s, merged into a
/// single model (first definition wins on class-name collisions).
pub fn load_file(path: &Path) -> Result<ModelDef, RunnerError> {
    let mut state = LoadState::default();
    // The top-level file cannot already be loaded, so this is never None.
    Ok(load_inner(path, &mut state)?.unwrap_or_default())
}

#[derive(Default)]
struct LoadState {
    /// Canonical paths on the current load chain, for cycle reporting.
    in_progress: Vec<PathBuf>,
    /// Every canonical path merged so far.
    done: FnvHashSet<PathBuf>,
}

fn load_inner(path: &Path, state: &mut LoadState) -> Result<Option<ModelDef>, RunnerError> {
    let canonical = fs::canonicalize(path).map_err(|e| io_error(path, e))?;
    if state.in_progress.contains(&canonical) {
        return Err(RunnerError::Cycle(format!(
            "justification file '{}' already loaded",
            path.display()
        )));
    }
    if !state.done.insert(canonical.clone()) {
        // Reached through a second route; the first merge stands.
        return Ok(None);
    }

    state.in_progress.push(canonical.clone());
    let mut model = parse_file(&canonical)?;
    let base = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    for load in model.load_stmts.clone() {
        if let Some(imported) = load_inner(&base.join(&load.path), state)? {
            model.update(imported);
        }
    }
    state.in_progress.pop();
    Ok(Some(model))
}

fn io_error(path: &Path, err: io::Error) -> RunnerError {
    if err.kind() == io::ErrorKind::NotFound {
        RunnerError::NotFound(format!("file not found: {}", path.display()))
    } else {
        RunnerError::Runtime(format!("cannot read {}: {}", path.display(), err))
    }
}

/// Build a model from JSON text mirroring the model shape.
pub fn parse_json(source: &str) -> Result<ModelDef, RunnerError> {
    let value: Json = serde_json::from_str(source)
        .map_err(|e| RunnerError::syntax(format!("invalid JSON model: {}", e)))?;
    model_from_json(&value)
}

/// Build a model from a pre-parsed JSON object.  Field names mirror the
/// DSL keywords; class and variable maps keep their object order.
pub fn model_from_json(value: &Json) -> Result<ModelDef, RunnerError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed("model must be an object"))?;
    let mut model = ModelDef::default();

    if let Some(loads) = object.get("load_stmts") {
        let entries = loads
            .as_array()
            .ok_or_else(|| malformed("load_stmts must be an array"))?;
        for entry in entries {
            let path = entry
                .as_str()
                .ok_or_else(|| malformed("load_stmts entries must be strings"))?;
            let stmt = LoadStmt {
                path: path.to_owned(),
            };
            if !model.load_stmts.contains(&stmt) {
                model.load_stmts.push(stmt);
            }
        }
    }

    if let Some(classes) = object.get("class_defs") {
        let entries = classes
            .as_object()
            .ok_or_else(|| malformed("class_defs must be an object"))?;
        for (key, class) in entries {
            let def = class_from_json(key, class)?;
            if model.class(&def.name).is_none() {
                model.class_defs.push(def);
            }
        }
    }

    Ok(model)
}

fn malformed(message: &str) -> RunnerError {
    RunnerError::syntax(format!("invalid JSON model: {}", message))
}

fn class_from_json(key: &str, value: &Json) -> Result<ClassDef, RunnerError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed("class entries must be objects"))?;
    let kind: ClassKind = object
        .get("class_type")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("class entries need a class_type"))?
        .parse()?;
    let name = object
        .get("name")
        .and_then(Json::as_str)
        .unwrap_or(key)
        .to_owned();
    let pattern = object
        .get("pattern")
        .and_then(Json::as_str)
        .map(str::to_owned);
    if pattern.is_some() && kind != ClassKind::Justification {
        return Err(RunnerError::syntax(format!(
            "keyword `implements` is only supported for justification, but is used in {}",
            kind
        )));
    }

    let body = object.get("body").and_then(Json::as_object);
    let body = match kind {
        ClassKind::Composition => {
            let mut compositions = Vec::new();
            if let Some(entries) = body.and_then(|b| b.get("compositions")) {
                let entries = entries
                    .as_array()
                    .ok_or_else(|| malformed("compositions must be an array"))?;
                for entry in entries {
                    compositions.push(
                        entry
                            .as_str()
                            .ok_or_else(|| malformed("compositions entries must be strings"))?
                            .to_owned(),
                    );
                }
            }
            ClassBody::Composition(CompositionDef { compositions })
        }
        _ => ClassBody::Justification(justification_from_json(body)?),
    };

    Ok(ClassDef {
        kind,
        name,
        pattern,
        body,
    })
}

fn justification_from_json(
    body: Option<&serde_json::Map<String, Json>>,
) -> Result<JustificationDef, RunnerError> {
    let mut def = JustificationDef::default();
    let body = match body {
        Some(body) => body,
        None => return Ok(def),
    };

    if let Some(variables) = body.get("variables") {
        let entries = variables
            .as_object()
            .ok_or_else(|| malformed("variables must be an object"))?;
        for (key, var) in entries {
            let object = var
                .as_object()
                .ok_or_else(|| malformed("variable entries must be objects"))?;
            let kind: VariableKind = object
                .get("var_type")
                .and_then(Json::as_str)
                .ok_or_else(|| malformed("variable entries need a var_type"))?
                .parse()?;
            let name = object
                .get("name")
                .and_then(Json::as_str)
                .unwrap_or(key)
                .to_owned();
            let description = object
                .get("description")
                .and_then(Json::as_str)
                .unwrap_or(&name)
                .to_owned();
            if def.variables.iter().any(|v| v.name == name) {
                return Err(RunnerError::syntax(format!(
                    "variable `{}` is declared twice",
                    name
                )));
            }
            def.variables.push(VariableDef {
                kind,
                name,
                description,
            });
        }
    }

    if let Some(supports) = body.get("supports") {
        let entries = supports
            .as_array()
            .ok_or_else(|| malformed("supports must be an array"))?;
        for entry in entries {
            let object = entry
                .as_object()
                .ok_or_else(|| malformed("support entries must be objects"))?;
            let left = object
                .get("left")
                .and_then(Json::as_str)
                .ok_or_else(|| malformed("support entries need a left name"))?;
            let right = object
                .get("right")
                .and_then(Json::as_str)
                .ok_or_else(|| malformed("support entries need a right name"))?;
            let support = SupportDef {
                left: left.to_owned(),
                right: right.to_owned(),
            };
            if !def.supports.contains(&support) {
                def.supports.push(support);
            }
        }
    }

    Ok(def)
}
