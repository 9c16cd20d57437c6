//! quadcheck - verification engine for quadlet-style unit file generators
//!
//! Given a directory produced by a unit-file generator and a fixture file
//! carrying embedded `## assert-*` directives, quadcheck decides whether the
//! generator behaved correctly.
//!
//! # Architecture
//!
//! The engine is a small interpreter over a closed directive language:
//!
//! - [`UnitFile`] — Canonicalized, multi-valued section/key model of the
//!   generated INI-style output
//! - [`ExecArgs`] — Shell-tokenized argument vectors for the exec fields of
//!   the `Service` section
//! - [`seq_match`] — Sub-sequence search over argument vectors (exact and
//!   regex-per-token, plus tail-anchored variants)
//! - [`key_val`] — Delimited `key=value` blob matching with repeated-option
//!   scanning
//! - [`Directive`] — One parsed assertion, dispatched through a closed name
//!   table
//! - [`ExpectedFileSet`] — Exact-set reconciliation of declared vs. produced
//!   output paths
//! - [`Outcome`] — Per-case evaluator tying the above together
//!
//! # Key Design Insights
//!
//! 1. **Directives are data**: a fixture line parses into a typed
//!    [`DirectiveKind`] once; evaluation is a match over that structure, not
//!    string-keyed dispatch.
//!
//! 2. **Exec vectors are never empty**: a missing exec key binds to the
//!    single placeholder token `podman`, so matchers always operate on a
//!    well-formed vector.
//!
//! 3. **Configuration errors are not test failures**: an unknown directive
//!    name or an invalid regex aborts the case as a fixture bug, distinct
//!    from an assertion evaluating false.
//!
//! # Example
//!
//! ```no_run
//! use quadcheck::{GeneratorRun, Outcome};
//!
//! let fixture = "\
//! [Container]
//! Image=localhost/imagename
//! ## assert-podman-args run
//! ";
//! let run = GeneratorRun { output: String::new(), success: true };
//! let outcome = Outcome::new(fixture, "test.service", run, "/tmp/out", &[])?;
//! outcome.check()?;
//! # Ok::<(), quadcheck::CaseFailure>(())
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod directive;
mod exec_args;
mod file_set;
pub mod key_val;
mod naming;
mod outcome;
pub mod seq_match;
mod unit_file;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

pub use directive::{
    parse_dependencies, parse_directives, Directive, DirectiveKind, EvalContext, Mode, Scope,
};
pub use exec_args::{ExecArgs, ExecField, BASE_PROGRAM};
pub use file_set::{list_output_files, ExpectedFileSet};
pub use naming::{service_file_name, template_file_name, UnitKind};
pub use outcome::{CaseFailure, GeneratorRun, Outcome};
pub use unit_file::{canonicalize, UnitFile};

/// Prelude module for convenient imports.
///
/// ```
/// use quadcheck::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        canonicalize, list_output_files, parse_dependencies, parse_directives, service_file_name,
        CaseFailure, Directive, DirectiveKind, EvalContext, ExecArgs, ExecField, ExpectedFileSet,
        GeneratorRun, Mode, Outcome, Scope, UnitFile, UnitKind, VerifyError,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from evaluating one test case.
///
/// The first seven variants are verdicts about the generator under test; the
/// remaining ones indicate a broken fixture or an unreadable sandbox and
/// abort the case without implicating the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Generator exited non-zero when success was expected.
    GeneratorFailed,
    /// Generator produced an output file although the fixture declared
    /// `assert-failed`.
    UnexpectedSuccess {
        /// The output file that should not exist.
        path: String,
    },
    /// The expected output file is absent and no fallback candidate exists.
    OutputNotFound {
        /// The canonical service file name that was searched for.
        name: String,
    },
    /// The fallback scan found more than one candidate output file.
    OutputAmbiguous {
        /// Number of `.service` files found in the output directory.
        count: usize,
    },
    /// A directive evaluated false (after negation).
    AssertionFailed {
        /// The directive line, re-joined with shell quoting.
        directive: String,
    },
    /// A declared-expected path is missing from the output directory.
    MissingExpectedFile {
        /// The missing path, relative to the output root.
        path: String,
    },
    /// The output directory contains paths no directive declared.
    UnexpectedFiles {
        /// The surplus paths, relative to the output root.
        paths: Vec<String>,
    },
    /// A directive names an operation outside the closed registry.
    UnknownDirective {
        /// The unrecognized operation name.
        name: String,
    },
    /// A directive argument failed to compile as a regular expression.
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying error message.
        source: String,
    },
    /// A fixture line could not be shell-tokenized.
    BadDirectiveLine {
        /// The offending line.
        line: String,
        /// The underlying error message.
        source: String,
    },
    /// A unit-file field value could not be shell-tokenized.
    BadExecValue {
        /// The key whose value failed to split.
        key: String,
        /// The underlying error message.
        source: String,
    },
    /// Filesystem access failed while inspecting the output directory.
    Io {
        /// The path being accessed.
        path: String,
        /// The underlying error message.
        source: String,
    },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GeneratorFailed => {
                write!(f, "Unexpected generator failure")
            }
            Self::UnexpectedSuccess { path } => {
                write!(f, "Unexpected success, found {path}")
            }
            Self::OutputNotFound { name } => {
                write!(f, "Unexpected failure, can't find {name}")
            }
            Self::OutputAmbiguous { count } => {
                write!(f, "Expected exactly one .service file, found {count}")
            }
            Self::AssertionFailed { directive } => {
                write!(f, "{directive}")
            }
            Self::MissingExpectedFile { path } => {
                write!(f, "Expected file not found in output directory: {path}")
            }
            Self::UnexpectedFiles { paths } => {
                write!(f, "Unexpected files in output directory: {paths:?}")
            }
            Self::UnknownDirective { name } => {
                write!(f, "unknown assertion {name}")
            }
            Self::InvalidPattern { pattern, source } => {
                write!(f, "invalid pattern \"{pattern}\": {source}")
            }
            Self::BadDirectiveLine { line, source } => {
                write!(f, "malformed directive line \"{line}\": {source}")
            }
            Self::BadExecValue { key, source } => {
                write!(f, "cannot tokenize value of {key}: {source}")
            }
            Self::Io { path, source } => {
                write!(f, "cannot access {path}: {source}")
            }
        }
    }
}

impl std::error::Error for VerifyError {}
