//! Closed enumerations shared by every pass: class kinds, variable kinds
//! and node statuses, together with their surface-syntax keywords.

use std::fmt;
use std::str::FromStr;

use crate::diag::RunnerError;

/// The three kinds of top-level class a model can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// A concrete diagram; the only kind the compiler materialises.
    Justification,
    /// A reusable skeleton with `@support` placeholders.
    Pattern,
    /// Declared by the grammar but carrying no executable semantics.
    Composition,
}

impl ClassKind {
    /// The keyword introducing this class kind in JD source.
    pub fn keyword(self) -> &'static str {
        match self {
            ClassKind::Justification => "justification",
            ClassKind::Pattern => "pattern",
            ClassKind::Composition => "composition",
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ClassKind {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<ClassKind, RunnerError> {
        match s {
            "justification" => Ok(ClassKind::Justification),
            "pattern" => Ok(ClassKind::Pattern),
            "composition" => Ok(ClassKind::Composition),
            other => Err(RunnerError::syntax(format!(
                "unknown class type `{}`",
                other
            ))),
        }
    }
}

/// The kinds of variable a justification or pattern body can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Evidence,
    Strategy,
    SubConclusion,
    Conclusion,
    /// Abstract anchor, legal only inside `pattern` classes.
    Support,
}

impl VariableKind {
    /// The keyword introducing this variable kind in JD source.
    pub fn keyword(self) -> &'static str {
        match self {
            VariableKind::Evidence => "evidence",
            VariableKind::Strategy => "strategy",
            VariableKind::SubConclusion => "sub-conclusion",
            VariableKind::Conclusion => "conclusion",
            VariableKind::Support => "@support",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for VariableKind {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<VariableKind, RunnerError> {
        match s {
            "evidence" => Ok(VariableKind::Evidence),
            "strategy" => Ok(VariableKind::Strategy),
            "sub-conclusion" => Ok(VariableKind::SubConclusion),
            "conclusion" => Ok(VariableKind::Conclusion),
            "@support" => Ok(VariableKind::Support),
            other => Err(RunnerError::syntax(format!(
                "unknown variable type `{}`",
                other
            ))),
        }
    }
}

/// Terminal verdict of one node after an evaluation run.
///
/// A node that has not been processed yet has no status at all; the
/// evaluator keeps statuses in a per-run overlay rather than on the
/// shared compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Skip => "SKIP",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_round_trip() {
        for kind in [
            ClassKind::Justification,
            ClassKind::Pattern,
            ClassKind::Composition,
        ] {
            assert_eq!(kind.keyword().parse::<ClassKind>().unwrap(), kind);
        }
        for kind in [
            VariableKind::Evidence,
            VariableKind::Strategy,
            VariableKind::SubConclusion,
            VariableKind::Conclusion,
            VariableKind::Support,
        ] {
            assert_eq!(kind.keyword().parse::<VariableKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_keywords_are_rejected() {
        assert!("assumption".parse::<ClassKind>().is_err());
        assert!("sub_conclusion".parse::<VariableKind>().is_err());
    }
}
