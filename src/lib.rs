//! Loads, validates and executes justification diagrams.
//!
//! A justification diagram is a small DAG encoding an argument that a
//! conclusion holds: evidence nodes ground strategies, strategies ground
//! sub-conclusions or the conclusion.  Diagrams are written in a small
//! declarative language (`.jd` files) whose `load` statements compose
//! models across files; an equivalent JSON shape is accepted for
//! programmatic use.
//!
//! Processing is split into passes.  Loading reads and merges source
//! files into a [`model::ModelDef`].  The compile pass materialises each
//! `justification` class into a typed DAG, expanding its `pattern` when
//! one is named, and validates the node-type calculus (a unique
//! conclusion, acyclicity, per-kind degree and reachability rules).
//! Evaluation then walks a compiled diagram predecessor-first, binds
//! evidence and strategy nodes to host procedures by a deterministic
//! label sanitisation rule, and folds the outcomes into per-node
//! PASS / FAIL / SKIP verdicts with strict failure propagation.
//!
//! [`engine::Engine`] ties the passes together and is the usual entry
//! point; the individual passes are public for callers that need finer
//! control.  Host procedures live in [`runtime::Library`] namespaces
//! behind the pluggable [`runtime::Runtime`] trait, and results stream
//! through the [`report::Reporter`] boundary.

pub mod compile;
pub mod defs;
pub mod diag;
pub mod engine;
pub mod evaluate;
pub mod graph;
pub mod lexer;
pub mod loader;
pub mod model;
pub mod parser;
pub mod report;
pub mod runtime;
pub mod transform;
pub mod util;
