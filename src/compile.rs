//! The justification compiler.
//!
//! Materialises each `justification` class into a typed DAG, expanding
//! the referenced pattern first when the class declares one, then checks
//! the node-type calculus: a unique conclusion, acyclicity, and the
//! per-kind degree and reachability rules.  Pattern and composition
//! classes are stored in the model but never compiled.

use fnv::FnvHashSet;
use itertools::Itertools;

use crate::defs::{ClassKind, VariableKind};
use crate::diag::RunnerError;
use crate::graph::{Dag, Node, NodeId};
use crate::model::{ClassDef, ModelDef, SupportDef, VariableDef};

/// A justification materialised as a typed DAG, ready for evaluation.
///
/// The DAG is immutable after compilation; per-run statuses live in an
/// overlay owned by the evaluator, so one compiled diagram can back any
/// number of runs.
#[derive(Debug, Clone)]
pub struct CompiledJustification {
    pub name: String,
    pub dag: Dag,
    pub conclusion: NodeId,
}

/// Compile every justification class in the model, in declaration order.
pub fn compile_model(model: &ModelDef) -> Result<Vec<CompiledJustification>, RunnerError> {
    model
        .class_defs
        .iter()
        .filter(|class| class.kind == ClassKind::Justification)
        .map(|class| compile_justification(model, class))
        .collect()
}

/// Compile a single justification class against its containing model.
pub fn compile_justification(
    model: &ModelDef,
    class: &ClassDef,
) -> Result<CompiledJustification, RunnerError> {
    let body = class.justification_body().ok_or_else(|| {
        invalid(class, "justification classes need a justification body".to_owned())
    })?;

    // Work on copies; pattern expansion must not touch the source model.
    let mut variables = body.variables.clone();
    let mut supports = body.supports.clone();

    if let Some(pattern_name) = &class.pattern {
        expand_pattern(model, class, pattern_name, &mut variables, &mut supports)?;
    }

    let mut dag = Dag::default();
    for var in &variables {
        dag.add_node(Node {
            name: var.name.clone(),
            kind: var.kind,
            label: var.description.clone(),
        });
    }
    for support in &supports {
        let left = dag.lookup(&support.left).ok_or_else(|| {
            invalid(
                class,
                format!("support references unknown variable `{}`", support.left),
            )
        })?;
        let right = dag.lookup(&support.right).ok_or_else(|| {
            invalid(
                class,
                format!("support references unknown variable `{}`", support.right),
            )
        })?;
        dag.add_edge(left, right);
    }

    let conclusion = validate(class, &dag)?;
    Ok(CompiledJustification {
        name: class.name.clone(),
        dag,
        conclusion,
    })
}

fn invalid(class: &ClassDef, message: String) -> RunnerError {
    RunnerError::InvalidJustification(format!("justification {}: {}", class.name, message))
}

/// Merge a pattern's supports and variables into the justification's own.
///
/// `@support` placeholders are the pattern's abstract anchors; the
/// concrete justification realises them with its own variables, so the
/// placeholders are not merged and pattern edges touching them are
/// dropped.  On name collisions the justification's declaration wins.
fn expand_pattern(
    model: &ModelDef,
    class: &ClassDef,
    pattern_name: &str,
    variables: &mut Vec<VariableDef>,
    supports: &mut Vec<SupportDef>,
) -> Result<(), RunnerError> {
    let pattern = model
        .pattern(pattern_name)
        .ok_or_else(|| invalid(class, format!("pattern {} not found", pattern_name)))?;

    let placeholders: FnvHashSet<&str> = pattern
        .variables
        .iter()
        .filter(|v| v.kind == VariableKind::Support)
        .map(|v| v.name.as_str())
        .collect();

    for support in &pattern.supports {
        if placeholders.contains(support.left.as_str())
            || placeholders.contains(support.right.as_str())
        {
            continue;
        }
        if !supports.contains(support) {
            supports.push(support.clone());
        }
    }
    for var in &pattern.variables {
        if var.kind == VariableKind::Support {
            continue;
        }
        if variables.iter().all(|v| v.name != var.name) {
            variables.push(var.clone());
        }
    }
    Ok(())
}

/// Check the node-type calculus; returns the conclusion's id.
fn validate(class: &ClassDef, dag: &Dag) -> Result<NodeId, RunnerError> {
    let conclusion = dag
        .nodes()
        .filter(|(_, node)| node.kind == VariableKind::Conclusion)
        .map(|(id, _)| id)
        .exactly_one()
        .map_err(|others| {
            invalid(
                class,
                format!("expected exactly one conclusion, found {}", others.count()),
            )
        })?;

    if dag.topological_order().is_none() {
        return Err(invalid(class, "support graph contains a cycle".to_owned()));
    }

    for (id, node) in dag.nodes() {
        match node.kind {
            VariableKind::Evidence => {
                if dag.in_degree(id) != 0 {
                    return Err(invalid(
                        class,
                        format!("evidence `{}` must not be supported", node.name),
                    ));
                }
                if !dag.reaches(id, conclusion) {
                    return Err(invalid(
                        class,
                        format!("evidence `{}` does not reach the conclusion", node.name),
                    ));
                }
                only_strategy_successors(class, dag, id)?;
            }
            VariableKind::Strategy => {
                if dag.in_degree(id) == 0 {
                    return Err(invalid(
                        class,
                        format!("strategy `{}` has no support", node.name),
                    ));
                }
                if dag.out_degree(id) != 1 {
                    return Err(invalid(
                        class,
                        format!(
                            "strategy `{}` must support exactly one node, found {}",
                            node.name,
                            dag.out_degree(id)
                        ),
                    ));
                }
                let succ = dag.node(dag.successors(id)[0]);
                if !matches!(
                    succ.kind,
                    VariableKind::SubConclusion | VariableKind::Conclusion
                ) {
                    return Err(invalid(
                        class,
                        format!(
                            "strategy `{}` may only support a sub-conclusion or the conclusion, found {} `{}`",
                            node.name, succ.kind, succ.name
                        ),
                    ));
                }
            }
            VariableKind::SubConclusion => {
                if dag.in_degree(id) == 0 {
                    return Err(invalid(
                        class,
                        format!("sub-conclusion `{}` has no support", node.name),
                    ));
                }
                if !dag.reaches(id, conclusion) {
                    return Err(invalid(
                        class,
                        format!(
                            "sub-conclusion `{}` does not reach the conclusion",
                            node.name
                        ),
                    ));
                }
                only_strategy_successors(class, dag, id)?;
            }
            VariableKind::Conclusion => {}
            VariableKind::Support => {
                return Err(invalid(
                    class,
                    format!(
                        "abstract @support `{}` cannot appear in a justification",
                        node.name
                    ),
                ));
            }
        }
    }

    Ok(conclusion)
}

fn only_strategy_successors(class: &ClassDef, dag: &Dag, id: NodeId) -> Result<(), RunnerError> {
    let node = dag.node(id);
    for &succ in dag.successors(id) {
        let succ = dag.node(succ);
        if succ.kind != VariableKind::Strategy {
            return Err(invalid(
                class,
                format!(
                    "{} `{}` may only support strategies, found {} `{}`",
                    node.kind, node.name, succ.kind, succ.name
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::loader;

    fn compile_first(source: &str) -> Result<CompiledJustification, RunnerError> {
        let model = loader::parse_source(source).unwrap();
        let class = model
            .class_defs
            .iter()
            .find(|c| c.kind == ClassKind::Justification)
            .expect("fixture declares a justification");
        compile_justification(&model, class)
    }

    #[test]
    fn compiles_a_linear_chain() {
        let compiled = compile_first(
            "justification J {\n\
             evidence e : \"E\"\n\
             strategy s : \"S\"\n\
             conclusion c : \"C\"\n\
             e supports s\n\
             s supports c\n\
             }",
        )
        .unwrap();
        assert_eq!(compiled.dag.len(), 3);
        assert_eq!(compiled.dag.node(compiled.conclusion).name, "c");
    }

    #[test]
    fn pattern_expansion_drops_the_placeholder() {
        let compiled = compile_first(
            "pattern P {\n\
             @support sup\n\
             strategy s : \"S\"\n\
             sub-conclusion sc : \"SC\"\n\
             conclusion c : \"C\"\n\
             sup supports s\n\
             s supports sc\n\
             sc supports c\n\
             }\n\
             pattern Q {\n\
             @support other\n\
             }\n\
             justification J implements P {\n\
             evidence e : \"E\"\n\
             e supports s\n\
             }",
        )
        .unwrap();

        let dag = &compiled.dag;
        assert_eq!(dag.len(), 4);
        assert!(dag.lookup("sup").is_none());
        let e = dag.lookup("e").unwrap();
        let s = dag.lookup("s").unwrap();
        let sc = dag.lookup("sc").unwrap();
        let c = dag.lookup("c").unwrap();
        assert_eq!(dag.successors(e), &[s]);
        assert_eq!(dag.successors(s), &[sc]);
        assert_eq!(dag.successors(sc), &[c]);
    }

    #[test]
    fn missing_pattern_is_invalid() {
        let err = compile_first(
            "justification J implements Ghost { conclusion c : \"C\" }",
        )
        .unwrap_err();
        assert_matches!(err, RunnerError::InvalidJustification(_));
        assert!(err.message().contains("pattern Ghost not found"));
    }

    #[test]
    fn missing_conclusion_is_invalid() {
        let err = compile_first(
            "justification J {\n\
             evidence e : \"E\"\n\
             strategy s : \"S\"\n\
             e supports s\n\
             }",
        )
        .unwrap_err();
        assert_matches!(err, RunnerError::InvalidJustification(_));
        assert!(err.message().contains("found 0"));
    }

    #[test]
    fn two_conclusions_are_invalid() {
        let err = compile_first(
            "justification J {\n\
             conclusion c1 : \"C1\"\n\
             conclusion c2 : \"C2\"\n\
             }",
        )
        .unwrap_err();
        assert!(err.message().contains("found 2"));
    }

    #[test]
    fn cycles_are_invalid() {
        let err = compile_first(
            "justification J {\n\
             strategy s1 : \"S1\"\n\
             strategy s2 : \"S2\"\n\
             conclusion c : \"C\"\n\
             s1 supports s2\n\
             s2 supports s1\n\
             s2 supports c\n\
             }",
        )
        .unwrap_err();
        assert!(err.message().contains("cycle"));
    }

    #[test]
    fn supported_evidence_is_invalid() {
        let err = compile_first(
            "justification J {\n\
             evidence e1 : \"E1\"\n\
             evidence e2 : \"E2\"\n\
             strategy s : \"S\"\n\
             conclusion c : \"C\"\n\
             e1 supports s\n\
             s supports c\n\
             e1 supports e2\n\
             }",
        )
        .unwrap_err();
        assert_matches!(err, RunnerError::InvalidJustification(_));
    }

    #[test]
    fn strategy_fan_out_is_invalid() {
        let err = compile_first(
            "justification J {\n\
             evidence e : \"E\"\n\
             strategy s : \"S\"\n\
             sub-conclusion sc1 : \"SC1\"\n\
             sub-conclusion sc2 : \"SC2\"\n\
             strategy t1 : \"T1\"\n\
             strategy t2 : \"T2\"\n\
             conclusion c : \"C\"\n\
             e supports s\n\
             s supports sc1\n\
             s supports sc2\n\
             sc1 supports t1\n\
             sc2 supports t2\n\
             t1 supports c\n\
             t2 supports c\n\
             }",
        )
        .unwrap_err();
        assert!(err.message().contains("exactly one node"));
    }

    #[test]
    fn disconnected_evidence_is_invalid() {
        let err = compile_first(
            "justification J {\n\
             evidence e1 : \"E1\"\n\
             evidence stray : \"Stray\"\n\
             strategy s : \"S\"\n\
             conclusion c : \"C\"\n\
             e1 supports s\n\
             s supports c\n\
             }",
        )
        .unwrap_err();
        assert!(err.message().contains("does not reach"));
    }

    #[test]
    fn unknown_support_endpoint_is_invalid() {
        let err = compile_first(
            "justification J {\n\
             conclusion c : \"C\"\n\
             ghost supports c\n\
             }",
        )
        .unwrap_err();
        assert!(err.message().contains("unknown variable `ghost`"));
    }

    #[test]
    fn support_placeholders_are_invalid_outside_patterns() {
        let err = compile_first(
            "justification J {\n\
             @support sup\n\
             conclusion c : \"C\"\n\
             }",
        )
        .unwrap_err();
        assert!(err.message().contains("@support"));
    }

    #[test]
    fn patterns_and_compositions_are_not_compiled() {
        let model = loader::parse_source(
            "pattern P { @support sup }\ncomposition C { X }\n\
             justification J { conclusion c : \"C\" }",
        )
        .unwrap();
        let compiled = compile_model(&model).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].name, "J");
    }
}
