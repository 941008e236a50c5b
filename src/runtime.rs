//! Host procedure runtimes.
//!
//! A runtime holds an ordered list of loaded libraries; each library is
//! a namespace of procedures and mutable variables.  The evaluator only
//! talks to the [`Runtime`] trait, so embedders can substitute their own
//! backend; the built-in [`LibraryRuntime`] resolves `load_files` paths
//! against a registry of natively registered libraries, the static
//! counterpart of loading a scripting module from disk.
//!
//! Runtimes are forked at the start of each diagram run: procedures are
//! shared, variable state is deep-copied, so one run's side effects can
//! never leak into another.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use fnv::FnvHashMap;
use itertools::Itertools;

use crate::diag::RunnerError;

/// A runtime value: the literal shapes a variable can hold and a
/// procedure can return.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    /// `None`, `false`, zero, the empty string and empty containers are
    /// falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[{}]", items.iter().map(Value::to_string).join(", "))
            }
            Value::Map(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v))
                    .join(", ")
            ),
        }
    }
}

/// Parse a literal: integer, float, boolean, `none`, quoted string, or
/// list/tuple/dict of literals.  Anything else is a `RUNTIME` error.
pub fn parse_literal(text: &str) -> Result<Value, RunnerError> {
    let mut parser = LiteralParser {
        text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.error("trailing characters after the literal"));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn error(&self, message: &str) -> RunnerError {
        RunnerError::Runtime(format!("invalid literal {:?}: {}", self.text, message))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value, RunnerError> {
        match self.peek() {
            None => Err(self.error("empty input")),
            Some(b'"') | Some(b'\'') => self.string(),
            Some(b'[') => self.sequence(b']'),
            Some(b'(') => self.sequence(b')'),
            Some(b'{') => self.map(),
            Some(c) if c == b'-' || c == b'+' || c.is_ascii_digit() => self.number(),
            Some(_) => self.word(),
        }
    }

    fn string(&mut self) -> Result<Value, RunnerError> {
        let quote = self.bytes[self.pos];
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(b'\\') => {
                    self.pos += 1;
                    let escape = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
                    out.push(match escape {
                        b'n' => '\n',
                        b't' => '\t',
                        b'r' => '\r',
                        b'\\' => '\\',
                        b'\'' => '\'',
                        b'"' => '"',
                        other => {
                            return Err(
                                self.error(&format!("unsupported escape `\\{}`", other as char))
                            )
                        }
                    });
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Value::Str(out));
                }
                Some(_) => {
                    let ch = self.text[self.pos..]
                        .chars()
                        .next()
                        .ok_or_else(|| self.error("invalid string contents"))?;
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn number(&mut self) -> Result<Value, RunnerError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => self.pos += 1,
                b'.' | b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'+' | b'-' if is_float && matches!(self.bytes[self.pos - 1], b'e' | b'E') => {
                    self.pos += 1
                }
                _ => break,
            }
        }
        let slice = &self.text[start..self.pos];
        if is_float {
            slice
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.error(&format!("malformed number `{}`", slice)))
        } else {
            slice
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.error(&format!("malformed number `{}`", slice)))
        }
    }

    fn word(&mut self) -> Result<Value, RunnerError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        match &self.text[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "none" | "None" | "null" => Ok(Value::None),
            "" => Err(self.error("unexpected character")),
            other => Err(self.error(&format!("unexpected token `{}`", other))),
        }
    }

    fn sequence(&mut self, close: u8) -> Result<Value, RunnerError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                None => return Err(self.error("unterminated sequence")),
                Some(_) => {}
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.error("expected `,` or a closing bracket")),
            }
        }
    }

    fn map(&mut self) -> Result<Value, RunnerError> {
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Map(entries));
                }
                None => return Err(self.error("unterminated dict")),
                Some(_) => {}
            }
            let key = match self.value()? {
                Value::Str(s) => s,
                other => return Err(self.error(&format!("dict keys must be strings, found {}", other))),
            };
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected `:` after a dict key"));
            }
            self.pos += 1;
            self.skip_ws();
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected `,` or `}`")),
            }
        }
    }
}

/// Mutable variable state of one library, visible to its procedures.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: FnvHashMap<String, Value>,
}

impl Scope {
    pub fn declares(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_owned(), value);
    }
}

/// A host procedure: reads and writes its library scope; the truthiness
/// of the returned value decides the node verdict.
pub type Procedure = Arc<dyn Fn(&mut Scope, &[Value]) -> Result<Value, RunnerError> + Send + Sync>;

/// A named namespace of procedures and variables.
#[derive(Clone)]
pub struct Library {
    name: String,
    procedures: FnvHashMap<String, Procedure>,
    scope: Scope,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Library {
        Library {
            name: name.into(),
            procedures: FnvHashMap::default(),
            scope: Scope::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a procedure under `name`.
    pub fn procedure<F>(mut self, name: &str, body: F) -> Library
    where
        F: Fn(&mut Scope, &[Value]) -> Result<Value, RunnerError> + Send + Sync + 'static,
    {
        self.procedures.insert(name.to_owned(), Arc::new(body));
        self
    }

    /// Declare a variable with its initial value.  Only declared
    /// variables can be re-bound through the runtime.
    pub fn variable(mut self, name: &str, initial: Value) -> Library {
        self.scope.set(name, initial);
        self
    }

    fn declares(&self, name: &str) -> bool {
        self.procedures.contains_key(name) || self.scope.declares(name)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("procedures", &self.procedures.keys().collect::<Vec<_>>())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Factories for natively registered libraries, keyed by the name a
/// `load_files` path resolves to (its file stem).
#[derive(Clone, Default)]
pub struct LibraryRegistry {
    factories: FnvHashMap<String, Arc<dyn Fn() -> Library + Send + Sync>>,
}

impl LibraryRegistry {
    pub fn new() -> LibraryRegistry {
        LibraryRegistry::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Library + Send + Sync + 'static,
    {
        self.factories.insert(name.to_owned(), Arc::new(factory));
    }

    pub fn instantiate(&self, name: &str) -> Option<Library> {
        self.factories.get(name).map(|factory| factory())
    }
}

impl fmt::Debug for LibraryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LibraryRegistry")
            .field("libraries", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The pluggable execution backend the evaluator binds nodes against.
pub trait Runtime {
    /// Load procedure libraries, in order.  A path that resolves to no
    /// known library is a `NOT_FOUND` error.
    fn load_files(&mut self, paths: &[PathBuf]) -> Result<(), RunnerError>;

    /// Bind `name` in every loaded library that declares it; binding an
    /// undeclared name is a `RUNTIME` error.
    fn set_variable(&mut self, name: &str, value: Value) -> Result<(), RunnerError>;

    /// Parse `literal` and bind it as [`Runtime::set_variable`] does.
    fn set_variable_literal(&mut self, name: &str, literal: &str) -> Result<(), RunnerError> {
        let value = parse_literal(literal)?;
        self.set_variable(name, value)
    }

    /// Resolve `name` in load order and invoke it.  Procedure errors
    /// bubble out for the evaluator to fold into the node event.
    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, RunnerError>;

    /// Deep-copy this runtime so a diagram run starts from the base
    /// state without cross-contamination.
    fn fork(&self) -> Box<dyn Runtime>;
}

/// The built-in runtime: libraries instantiated from a registry.
#[derive(Debug, Clone, Default)]
pub struct LibraryRuntime {
    registry: LibraryRegistry,
    libraries: Vec<Library>,
}

impl LibraryRuntime {
    pub fn new(registry: LibraryRegistry) -> LibraryRuntime {
        LibraryRuntime {
            registry,
            libraries: Vec::new(),
        }
    }

    /// Build a runtime the way the CLI does: libraries first, then
    /// variable bindings.
    pub fn with_setup(
        registry: LibraryRegistry,
        paths: &[PathBuf],
        variables: &[(String, String)],
    ) -> Result<LibraryRuntime, RunnerError> {
        let mut runtime = LibraryRuntime::new(registry);
        runtime.load_files(paths)?;
        for (name, value) in variables {
            runtime.set_variable(name, Value::Str(value.clone()))?;
        }
        Ok(runtime)
    }

    /// Append an already-built library, bypassing the registry.
    pub fn push_library(&mut self, library: Library) {
        self.libraries.push(library);
    }

    /// Index of the first library, in load order, that declares `name`.
    fn resolve(&self, name: &str) -> Result<usize, RunnerError> {
        self.libraries
            .iter()
            .position(|lib| lib.declares(name))
            .ok_or_else(|| RunnerError::Runtime(format!("no loaded library defines `{}`", name)))
    }
}

impl Runtime for LibraryRuntime {
    fn load_files(&mut self, paths: &[PathBuf]) -> Result<(), RunnerError> {
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    RunnerError::NotFound(format!(
                        "library path has no usable name: {}",
                        path.display()
                    ))
                })?;
            let library = self.registry.instantiate(stem).ok_or_else(|| {
                RunnerError::NotFound(format!(
                    "no registered library named `{}` (from {})",
                    stem,
                    path.display()
                ))
            })?;
            self.libraries.push(library);
        }
        Ok(())
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<(), RunnerError> {
        // Bind in every declaring library so shared variables stay in
        // step across libraries.
        let mut found = false;
        for library in &mut self.libraries {
            if library.scope.declares(name) {
                library.scope.set(name, value.clone());
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(RunnerError::Runtime(format!(
                "no loaded library declares variable `{}`",
                name
            )))
        }
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, RunnerError> {
        let index = self.resolve(name)?;
        let library = &mut self.libraries[index];
        let procedure = library.procedures.get(name).cloned().ok_or_else(|| {
            RunnerError::Runtime(format!(
                "`{}` is a variable of library `{}`, not a procedure",
                name, library.name
            ))
        })?;
        procedure(&mut library.scope, args)
    }

    fn fork(&self) -> Box<dyn Runtime> {
        Box::new(self.clone())
    }
}
