//! Command-line front-end.
//!
//! Loads a `.jd` file, selects diagrams by glob, builds the runtime from
//! the requested libraries and variable bindings, and justifies each
//! selected diagram on its own runtime fork.  The exit code is the
//! number of selected diagrams that did not fully pass.

use std::path::PathBuf;
use std::process;

use clap::{App, Arg};
use log::error;

use jd_runner::diag::{self, ErrorKind, RunnerError};
use jd_runner::engine::{Engine, EngineOptions};
use jd_runner::evaluate::RunOptions;
use jd_runner::report::LogReporter;
use jd_runner::runtime::{LibraryRegistry, LibraryRuntime, Runtime, Value};

struct Cli {
    jd_file: PathBuf,
    libraries: Vec<PathBuf>,
    variables: Vec<String>,
    diagram: String,
    dry_run: bool,
    verbose: bool,
}

fn parse_args() -> Cli {
    let matches = App::new("jd-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loads justification diagrams, validates them and runs their checks")
        .arg(
            Arg::with_name("library")
                .short("l")
                .long("library")
                .value_name("PATH")
                .multiple(true)
                .number_of_values(1)
                .help("Procedure library to load"),
        )
        .arg(
            Arg::with_name("variable")
                .short("v")
                .long("variable")
                .value_name("NAME:VALUE")
                .multiple(true)
                .number_of_values(1)
                .help("Bind a variable after loading libraries"),
        )
        .arg(
            Arg::with_name("diagram")
                .short("d")
                .long("diagram")
                .value_name("PATTERN")
                .default_value("*")
                .help("Only evaluate diagrams whose name matches this glob"),
        )
        .arg(
            Arg::with_name("dry-run")
                .long("dry-run")
                .help("Skip every node instead of calling procedures"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("V")
                .long("verbose")
                .help("Enable debug logging and pass timing"),
        )
        .arg(
            Arg::with_name("jd_file")
                .value_name("FILE")
                .required(true)
                .help("Path to the justification .jd file"),
        )
        .get_matches();

    Cli {
        jd_file: PathBuf::from(matches.value_of("jd_file").unwrap_or_default()),
        libraries: matches
            .values_of("library")
            .map(|values| values.map(PathBuf::from).collect())
            .unwrap_or_default(),
        variables: matches
            .values_of("variable")
            .map(|values| values.map(str::to_owned).collect())
            .unwrap_or_default(),
        diagram: matches.value_of("diagram").unwrap_or("*").to_owned(),
        dry_run: matches.is_present("dry-run"),
        verbose: matches.is_present("verbose"),
    }
}

fn main() {
    let cli = parse_args();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            report_error(&cli, &err);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<i32, RunnerError> {
    let mut engine = Engine::new(EngineOptions { timing: cli.verbose });
    engine.load_file(&cli.jd_file)?;

    let pattern = glob::Pattern::new(&cli.diagram)
        .map_err(|e| RunnerError::Runtime(format!("invalid diagram pattern: {}", e)))?;
    let selected: Vec<String> = engine
        .diagram_names()?
        .into_iter()
        .filter(|name| pattern.matches(name))
        .collect();
    if selected.is_empty() {
        error!("No justification diagram found: {}", cli.diagram);
        return Ok(1);
    }

    // Native libraries are registered here by embedding applications;
    // the stock binary starts from an empty registry.
    let registry = LibraryRegistry::new();
    let mut runtime = LibraryRuntime::new(registry);
    runtime.load_files(&cli.libraries)?;
    for binding in &cli.variables {
        let (name, value) = binding.split_once(':').ok_or_else(|| {
            RunnerError::Runtime(format!(
                "invalid variable binding `{}`, expected NAME:VALUE",
                binding
            ))
        })?;
        runtime.set_variable(name, Value::Str(value.to_owned()))?;
    }

    let options = RunOptions {
        dry_run: cli.dry_run,
    };
    let mut reporter = LogReporter::default();
    let mut fully_passed = 0usize;
    for name in &selected {
        let verdict = engine.justify(name, &runtime, options, &mut reporter)?;
        if verdict.all_passed() {
            fully_passed += 1;
        }
    }

    Ok((selected.len() - fully_passed) as i32)
}

fn report_error(cli: &Cli, err: &RunnerError) {
    // Syntax errors from the top-level file come with a span; show the
    // offending line.  Errors from transitively loaded files fall back
    // to the plain message.
    if err.kind() == ErrorKind::Syntax && err.span().is_some() {
        if let Ok(source) = std::fs::read_to_string(&cli.jd_file) {
            let in_range = err.span().map_or(false, |span| span.end <= source.len());
            if in_range {
                eprintln!(
                    "{}",
                    diag::render_snippet(err, &cli.jd_file.display().to_string(), &source)
                );
                return;
            }
        }
    }
    error!("{}", err);
}
