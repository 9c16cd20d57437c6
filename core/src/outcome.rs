//! `Outcome` — Per-case evaluation
//!
//! Ties the engine together for one test case: decide expected-success vs.
//! expected-failure, locate the produced output file, parse it, bind the
//! exec argument vectors, run every directive in declaration order, and
//! reconcile the expected file set against the output directory.
//!
//! One `Outcome` owns everything it needs; no process-wide state. The
//! generator has already run when an `Outcome` is constructed; only its
//! captured output, exit status, and output directory cross the boundary.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    canonicalize, directive, file_set, DirectiveKind, EvalContext, ExecArgs, ExpectedFileSet,
    UnitFile, VerifyError,
};

/// Captured results of the external generator process.
#[derive(Debug, Clone)]
pub struct GeneratorRun {
    /// Combined stdout and stderr text.
    pub output: String,
    /// Whether the process exited with status zero.
    pub success: bool,
}

/// A failed test case, with full diagnostic context.
///
/// Displays as the failure reason followed by the captured process output
/// and, when one was parsed, the generated file's contents.
#[derive(Debug, Clone)]
pub struct CaseFailure {
    /// What went wrong.
    pub error: VerifyError,
    stdout: String,
    unit_name: String,
    unit_text: String,
}

impl std::fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.stdout.is_empty() {
            write!(f, "\n--- STDOUT/ERR ---\n{}", self.stdout)?;
        }
        if !self.unit_text.is_empty() {
            write!(
                f,
                "\n---------- contents of {} ----------\n{}",
                self.unit_name, self.unit_text
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for CaseFailure {}

/// Evaluator for one test case.
#[derive(Debug)]
pub struct Outcome {
    directives: Vec<directive::Directive>,
    expect_fail: bool,
    stdout: String,
    outdir: PathBuf,
    service_name: String,
    expected_files: ExpectedFileSet,
    unit_text: String,
}

impl Outcome {
    /// Prepare evaluation of one case.
    ///
    /// `fixture` is the raw fixture text; `service_name` the canonical
    /// derived output file name; `dependency_services` the service file
    /// names of `## depends-on` declarations, already derived by the
    /// caller.
    ///
    /// # Errors
    ///
    /// Fails on malformed or unknown directives, and when the generator
    /// exited non-zero although the fixture does not declare
    /// `assert-failed`.
    pub fn new(
        fixture: &str,
        service_name: impl Into<String>,
        run: GeneratorRun,
        outdir: impl Into<PathBuf>,
        dependency_services: &[String],
    ) -> Result<Self, CaseFailure> {
        let service_name = service_name.into();
        let fail = |error: VerifyError| CaseFailure {
            error,
            stdout: run.output.clone(),
            unit_name: service_name.clone(),
            unit_text: String::new(),
        };

        let directives = directive::parse_directives(fixture).map_err(&fail)?;
        let expect_fail = directives
            .iter()
            .any(|d| d.kind == DirectiveKind::Failed && !d.negated);

        if !run.success && !expect_fail {
            return Err(fail(VerifyError::GeneratorFailed));
        }

        let mut expected_files = ExpectedFileSet::new();
        for dep in dependency_services {
            expected_files.add(dep);
        }

        Ok(Self {
            directives,
            expect_fail,
            stdout: run.output,
            outdir: outdir.into(),
            service_name,
            expected_files,
            unit_text: String::new(),
        })
    }

    /// Run the evaluation to a verdict.
    ///
    /// # Errors
    ///
    /// Returns the first failure: unexpected success or output location,
    /// a false directive, a file-set mismatch, or a fixture bug.
    pub fn check(mut self) -> Result<(), CaseFailure> {
        if self.expect_fail {
            return self.check_expected_failure();
        }

        let service_path = self.locate_output()?;
        self.unit_text = std::fs::read_to_string(&service_path).map_err(|e| {
            self.failure(VerifyError::Io {
                path: service_path.display().to_string(),
                source: e.to_string(),
            })
        })?;

        let unit = UnitFile::parse(&canonicalize(&self.unit_text));
        let exec = ExecArgs::bind(&unit).map_err(|e| self.failure(e))?;
        self.expected_files.add(&self.service_name);

        debug!(
            service = %self.service_name,
            directives = self.directives.len(),
            "evaluating case"
        );

        let directives = std::mem::take(&mut self.directives);
        for d in &directives {
            let verdict = {
                let mut ctx = EvalContext {
                    stdout: &self.stdout,
                    unit: &unit,
                    exec: &exec,
                    outdir: &self.outdir,
                    expected_files: &mut self.expected_files,
                };
                d.evaluate(&mut ctx)
            };
            match verdict {
                Err(e) => return Err(self.failure(e)),
                Ok(false) => {
                    return Err(self.failure(VerifyError::AssertionFailed {
                        directive: d.raw.clone(),
                    }));
                }
                Ok(true) => debug!(directive = %d.raw, "passed"),
            }
        }

        let listing = file_set::list_output_files(&self.outdir).map_err(|e| self.failure(e))?;
        self.expected_files
            .reconcile(&listing)
            .map_err(|e| self.failure(e))
    }

    /// The generator must have produced nothing at all.
    fn check_expected_failure(&self) -> Result<(), CaseFailure> {
        let service_path = self.outdir.join(&self.service_name);
        if service_path.is_file() {
            return Err(self.failure(VerifyError::UnexpectedSuccess {
                path: service_path.display().to_string(),
            }));
        }
        let listing = file_set::list_output_files(&self.outdir).map_err(|e| self.failure(e))?;
        if let Some(produced) = listing.iter().find(|path| !path.ends_with('/')) {
            return Err(self.failure(VerifyError::UnexpectedSuccess {
                path: produced.clone(),
            }));
        }
        Ok(())
    }

    /// Find the produced service file, falling back to a scan for a single
    /// `.service` file under a different name.
    fn locate_output(&mut self) -> Result<PathBuf, CaseFailure> {
        let canonical = self.outdir.join(&self.service_name);
        if canonical.is_file() {
            return Ok(canonical);
        }

        let candidates = service_files_in(&self.outdir).map_err(|e| self.failure(e))?;
        match candidates.as_slice() {
            [only] => {
                self.service_name = only.clone();
                Ok(self.outdir.join(only))
            }
            [] => Err(self.failure(VerifyError::OutputNotFound {
                name: self.service_name.clone(),
            })),
            many => Err(self.failure(VerifyError::OutputAmbiguous { count: many.len() })),
        }
    }

    fn failure(&self, error: VerifyError) -> CaseFailure {
        CaseFailure {
            error,
            stdout: self.stdout.clone(),
            unit_name: self.service_name.clone(),
            unit_text: self.unit_text.clone(),
        }
    }
}

/// Non-recursive listing of `.service` file names directly under `dir`.
fn service_files_in(dir: &Path) -> Result<Vec<String>, VerifyError> {
    let io_err = |e: std::io::Error| VerifyError::Io {
        path: dir.display().to_string(),
        source: e.to_string(),
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "service") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
