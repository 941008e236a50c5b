//! Lowering of the parse tree into model values.
//!
//! String literals are JSON-decoded here, keyword tokens become enum
//! values, and the two-parameter class header (`implements`) is checked
//! to appear only on justification classes.

use crate::defs::{ClassKind, VariableKind};
use crate::diag::RunnerError;
use crate::lexer::TokenKind;
use crate::model::{
    ClassBody, ClassDef, CompositionDef, JustificationDef, LoadStmt, ModelDef, SupportDef,
    VariableDef,
};
use crate::parser::{self, BodyItem, ClassItem, Entry, Item};
use crate::util::unquote_string;

/// Parse JD source and lower it into a model in one step.
pub fn model_from_source(source: &str) -> Result<ModelDef, RunnerError> {
    lower(parser::parse(source)?)
}

fn lower(items: Vec<Item>) -> Result<ModelDef, RunnerError> {
    let mut model = ModelDef::default();
    for item in items {
        match item {
            Item::Load { path } => {
                let decoded = unquote_string(&path.text).map_err(|e| e.with_span(path.span))?;
                let stmt = LoadStmt { path: decoded };
                if !model.load_stmts.contains(&stmt) {
                    model.load_stmts.push(stmt);
                }
            }
            Item::Class(class) => {
                let def = lower_class(class)?;
                if model.class(&def.name).is_none() {
                    model.class_defs.push(def);
                }
            }
        }
    }
    Ok(model)
}

fn class_kind(kind: TokenKind) -> ClassKind {
    match kind {
        TokenKind::Justification => ClassKind::Justification,
        TokenKind::Pattern => ClassKind::Pattern,
        TokenKind::Composition => ClassKind::Composition,
        // The parser only builds a ClassItem from these three keywords.
        _ => unreachable!("not a class keyword: {:?}", kind),
    }
}

fn variable_kind(kind: TokenKind) -> VariableKind {
    match kind {
        TokenKind::Evidence => VariableKind::Evidence,
        TokenKind::Strategy => VariableKind::Strategy,
        TokenKind::SubConclusion => VariableKind::SubConclusion,
        TokenKind::Conclusion => VariableKind::Conclusion,
        TokenKind::AtSupport => VariableKind::Support,
        _ => unreachable!("not a variable keyword: {:?}", kind),
    }
}

fn lower_class(item: ClassItem) -> Result<ClassDef, RunnerError> {
    let kind = class_kind(item.keyword.kind);

    if let Some(pattern) = &item.implements {
        if kind != ClassKind::Justification {
            return Err(RunnerError::syntax_at(
                format!(
                    "keyword `implements` is only supported for justification, but is used in {}",
                    kind
                ),
                pattern.span,
            ));
        }
    }

    let body = match item.body {
        BodyItem::Justification(entries) => {
            ClassBody::Justification(lower_justification(entries)?)
        }
        BodyItem::Composition(refs) => ClassBody::Composition(CompositionDef {
            compositions: refs.into_iter().map(|t| t.text).collect(),
        }),
    };

    Ok(ClassDef {
        kind,
        name: item.name.text,
        pattern: item.implements.map(|t| t.text),
        body,
    })
}

fn lower_justification(entries: Vec<Entry>) -> Result<JustificationDef, RunnerError> {
    let mut body = JustificationDef::default();
    for entry in entries {
        match entry {
            Entry::Variable {
                keyword,
                name,
                instruction,
            } => {
                if body.variables.iter().any(|v| v.name == name.text) {
                    return Err(RunnerError::syntax_at(
                        format!("variable `{}` is declared twice", name.text),
                        name.span,
                    ));
                }
                let description = match instruction {
                    Some(text) => {
                        unquote_string(&text.text).map_err(|e| e.with_span(text.span))?
                    }
                    // A bare declaration labels the node with its own name.
                    None => name.text.clone(),
                };
                body.variables.push(VariableDef {
                    kind: variable_kind(keyword.kind),
                    name: name.text,
                    description,
                });
            }
            Entry::Support { left, right } => {
                let support = SupportDef {
                    left: left.text,
                    right: right.text,
                };
                if !body.supports.contains(&support) {
                    body.supports.push(support);
                }
            }
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::diag::ErrorKind;

    #[test]
    fn lowers_a_full_class() {
        let model = model_from_source(
            "justification J {\n\
             evidence e1 : \"Check PEP8 coding standard\"\n\
             strategy s1 : \"Assess quality gates\"\n\
             conclusion c : \"Ready to ship\"\n\
             e1 supports s1\n\
             s1 supports c\n\
             }",
        )
        .unwrap();
        let class = model.class("J").unwrap();
        assert_eq!(class.kind, ClassKind::Justification);
        let body = class.justification_body().unwrap();
        assert_eq!(body.variables.len(), 3);
        assert_eq!(body.variables[0].kind, VariableKind::Evidence);
        assert_eq!(body.variables[0].description, "Check PEP8 coding standard");
        assert_eq!(body.supports.len(), 2);
    }

    #[test]
    fn implements_is_rejected_outside_justifications() {
        let err = model_from_source("pattern P implements Q { }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.message().contains("implements"));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let model =
            model_from_source("justification J { conclusion c : \"line\\nbreak\" }").unwrap();
        let body = model.class("J").unwrap().justification_body().unwrap();
        assert_eq!(body.variables[0].description, "line\nbreak");
    }

    #[test]
    fn duplicate_variables_are_rejected() {
        let err = model_from_source(
            "justification J { evidence e : \"A\" strategy e : \"B\" }",
        )
        .unwrap_err();
        assert_matches!(err, RunnerError::Syntax { .. });
        assert!(err.message().contains("declared twice"));
    }

    #[test]
    fn duplicate_supports_collapse() {
        let model = model_from_source(
            "justification J { evidence e : \"E\" strategy s : \"S\" e supports s e supports s }",
        )
        .unwrap();
        let body = model.class("J").unwrap().justification_body().unwrap();
        assert_eq!(body.supports.len(), 1);
    }

    #[test]
    fn bare_variables_use_their_name_as_label() {
        let model = model_from_source("pattern P { @support anchor }").unwrap();
        let body = model.class("P").unwrap().justification_body().unwrap();
        assert_eq!(body.variables[0].description, "anchor");
    }
}
