//! Model values built by the transformer and consumed by the compiler.
//!
//! A [`ModelDef`] is the assembled result of loading one or more JD
//! files.  It is frozen after loading: the compiler deep-copies what it
//! needs, so a model can back any number of compiled diagrams.
//!
//! `Display` serialises a model back to JD source; parsing that output
//! yields an equal model, which keeps the two representations honest.

use std::fmt;

use crate::defs::{ClassKind, VariableKind};

/// A named, typed declaration inside a class body.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub kind: VariableKind,
    pub name: String,
    /// Free-text label; the evaluator sanitises it into a procedure name.
    pub description: String,
}

/// A directed edge `left → right`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SupportDef {
    pub left: String,
    pub right: String,
}

/// Body of a `justification` or `pattern` class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JustificationDef {
    /// Unique by name, in declaration order.
    pub variables: Vec<VariableDef>,
    /// Deduplicated, in declaration order.
    pub supports: Vec<SupportDef>,
}

/// Body of a `composition` class; opaque to the core.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositionDef {
    pub compositions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassBody {
    Justification(JustificationDef),
    Composition(CompositionDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub kind: ClassKind,
    pub name: String,
    /// Pattern to expand; non-`None` only when `kind` is `Justification`.
    pub pattern: Option<String>,
    pub body: ClassBody,
}

impl ClassDef {
    pub fn justification_body(&self) -> Option<&JustificationDef> {
        match &self.body {
            ClassBody::Justification(body) => Some(body),
            ClassBody::Composition(_) => None,
        }
    }
}

/// `load "path";` — the path is resolved relative to the importing file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadStmt {
    pub path: String,
}

/// The top-level model: load statements plus class definitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelDef {
    pub load_stmts: Vec<LoadStmt>,
    /// Unique by name, in declaration order.
    pub class_defs: Vec<ClassDef>,
}

impl ModelDef {
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.class_defs.iter().find(|c| c.name == name)
    }

    /// First pattern class with the given name.  There is no namespace
    /// scoping across loaded files, so the first-added entry wins.
    pub fn pattern(&self, name: &str) -> Option<&JustificationDef> {
        self.class_defs
            .iter()
            .find(|c| c.kind == ClassKind::Pattern && c.name == name)
            .and_then(ClassDef::justification_body)
    }

    /// Merge `other` into `self`: load statements union by path, classes
    /// union by name with the first definition winning.
    pub fn update(&mut self, other: ModelDef) {
        for load in other.load_stmts {
            if !self.load_stmts.contains(&load) {
                self.load_stmts.push(load);
            }
        }
        for class in other.class_defs {
            if self.class(&class.name).is_none() {
                self.class_defs.push(class);
            }
        }
    }
}

fn json_quote(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

impl fmt::Display for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for load in &self.load_stmts {
            writeln!(f, "load {};", json_quote(&load.path))?;
        }
        if !self.load_stmts.is_empty() && !self.class_defs.is_empty() {
            writeln!(f)?;
        }
        for (i, class) in self.class_defs.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", class)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if let Some(pattern) = &self.pattern {
            write!(f, " implements {}", pattern)?;
        }
        writeln!(f, " {{")?;
        match &self.body {
            ClassBody::Justification(body) => {
                for var in &body.variables {
                    writeln!(
                        f,
                        "    {} {} : {}",
                        var.kind,
                        var.name,
                        json_quote(&var.description)
                    )?;
                }
                for support in &body.supports {
                    writeln!(f, "    {} supports {}", support.left, support.right)?;
                }
            }
            ClassBody::Composition(body) => {
                for name in &body.compositions {
                    writeln!(f, "    {}", name)?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader;

    fn sample() -> ModelDef {
        ModelDef {
            load_stmts: vec![LoadStmt {
                path: "common.jd".to_owned(),
            }],
            class_defs: vec![ClassDef {
                kind: ClassKind::Justification,
                name: "Release".to_owned(),
                pattern: Some("Quality".to_owned()),
                body: ClassBody::Justification(JustificationDef {
                    variables: vec![
                        VariableDef {
                            kind: VariableKind::Evidence,
                            name: "e1".to_owned(),
                            description: "Check \"quoted\" things".to_owned(),
                        },
                        VariableDef {
                            kind: VariableKind::Conclusion,
                            name: "c".to_owned(),
                            description: "Ready to ship".to_owned(),
                        },
                    ],
                    supports: vec![SupportDef {
                        left: "e1".to_owned(),
                        right: "c".to_owned(),
                    }],
                }),
            }],
        }
    }

    #[test]
    fn serialised_model_parses_back_equal() {
        let model = sample();
        let reparsed = loader::parse_source(&model.to_string()).unwrap();
        assert_eq!(reparsed, model);
    }

    #[test]
    fn update_unions_with_first_wins() {
        let mut model = sample();
        let mut other = sample();
        other.class_defs[0].pattern = None;
        other.class_defs.push(ClassDef {
            kind: ClassKind::Pattern,
            name: "Quality".to_owned(),
            pattern: None,
            body: ClassBody::Justification(JustificationDef::default()),
        });
        model.update(other);

        // The existing Release class kept its pattern reference; the new
        // Quality class was appended; load statements merged once.
        assert_eq!(model.load_stmts.len(), 1);
        assert_eq!(model.class_defs.len(), 2);
        assert_eq!(model.class_defs[0].pattern.as_deref(), Some("Quality"));
    }

    #[test]
    fn pattern_lookup_ignores_non_pattern_classes() {
        let model = sample();
        assert!(model.pattern("Release").is_none());
        assert!(model.class("Release").is_some());
    }
}
