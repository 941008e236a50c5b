//! Error taxonomy and diagnostic rendering.
//!
//! Every fallible operation in the crate reports a [`RunnerError`].  The
//! variants form a flat taxonomy; [`RunnerError::kind`] exposes the
//! category for callers that dispatch on it (the evaluator stores whole
//! errors in node events, the CLI only needs the category and message).
//!
//! Syntax errors additionally carry the byte span of the offending token
//! so the CLI can render them as an annotated snippet against the source
//! buffer they came from.

use std::error::Error;
use std::fmt;

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};

/// Half-open byte range into a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }
}

/// The error categories of the runner, one per failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Unsupported,
    NotFound,
    Cycle,
    InvalidJustification,
    Function,
    Runtime,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "SYNTAX",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Cycle => "CYCLE",
            ErrorKind::InvalidJustification => "INVALID_JUSTIFICATION",
            ErrorKind::Function => "FUNCTION",
            ErrorKind::Runtime => "RUNTIME",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by any pass of the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerError {
    /// Grammar violation or undecodable string literal.
    Syntax { message: String, span: Option<Span> },
    /// The model uses a feature this implementation rejects.
    Unsupported(String),
    /// Missing file, pattern or library.
    NotFound(String),
    /// The `load` graph is not a DAG.
    Cycle(String),
    /// A node-type validation rule failed during compilation.
    InvalidJustification(String),
    /// A host procedure returned a falsy value or raised.
    Function(String),
    /// Any other runtime fault.
    Runtime(String),
}

impl RunnerError {
    /// Syntax error with no recorded location.
    pub fn syntax(message: impl Into<String>) -> RunnerError {
        RunnerError::Syntax {
            message: message.into(),
            span: None,
        }
    }

    /// Syntax error anchored at `span`.
    pub fn syntax_at(message: impl Into<String>, span: Span) -> RunnerError {
        RunnerError::Syntax {
            message: message.into(),
            span: Some(span),
        }
    }

    /// Attach a span to a syntax error that lacks one; other variants are
    /// returned untouched.
    pub fn with_span(self, span: Span) -> RunnerError {
        match self {
            RunnerError::Syntax { message, span: None } => RunnerError::Syntax {
                message,
                span: Some(span),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::Syntax { .. } => ErrorKind::Syntax,
            RunnerError::Unsupported(_) => ErrorKind::Unsupported,
            RunnerError::NotFound(_) => ErrorKind::NotFound,
            RunnerError::Cycle(_) => ErrorKind::Cycle,
            RunnerError::InvalidJustification(_) => ErrorKind::InvalidJustification,
            RunnerError::Function(_) => ErrorKind::Function,
            RunnerError::Runtime(_) => ErrorKind::Runtime,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RunnerError::Syntax { message, .. } => message,
            RunnerError::Unsupported(m)
            | RunnerError::NotFound(m)
            | RunnerError::Cycle(m)
            | RunnerError::InvalidJustification(m)
            | RunnerError::Function(m)
            | RunnerError::Runtime(m) => m,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            RunnerError::Syntax { span, .. } => *span,
            _ => None,
        }
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl Error for RunnerError {}

/// Render a spanned error as an annotated snippet against the source
/// buffer it was raised from.  `origin` is the file name shown in the
/// header line.
pub fn render_snippet(err: &RunnerError, origin: &str, source: &str) -> String {
    let span = err.span().unwrap_or_default();
    let start = span.start.min(source.len());
    let end = span.end.clamp(start, source.len());

    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[start..]
        .find('\n')
        .map_or(source.len(), |i| start + i);
    let line = &source[line_start..line_end];
    let line_number = source[..line_start].matches('\n').count() + 1;

    let mut lo = start - line_start;
    let mut hi = end.min(line_end) - line_start;
    if hi <= lo {
        // Zero-width spans (e.g. unexpected end of input) still need a
        // visible caret.
        hi = (lo + 1).min(line.len());
        lo = hi.saturating_sub(1);
    }

    let annotations = if line.is_empty() {
        vec![]
    } else {
        vec![SourceAnnotation {
            range: (lo, hi),
            label: "",
            annotation_type: AnnotationType::Error,
        }]
    };

    let snippet = Snippet {
        title: Some(Annotation {
            label: Some(err.message()),
            id: None,
            annotation_type: AnnotationType::Error,
        }),
        footer: vec![],
        slices: vec![Slice {
            source: line,
            line_start: line_number,
            origin: Some(origin),
            annotations,
            fold: false,
        }],
        opt: FormatOptions {
            color: true,
            ..FormatOptions::default()
        },
    };
    DisplayList::from(snippet).to_string()
}
