//! quadcheck CLI — test-suite driver for the verification engine.
//!
//! Walks a testcases directory for unit-file fixtures, runs the generator
//! under test against each one in an isolated sandbox, and evaluates the
//! fixture's embedded assertions against the produced output.
//!
//! ```text
//! quadcheck [--user] [--json] <testcases-dir> <generator-bin>
//! ```
//!
//! By default both passes run: rootful first, then rootless (`--user` flag
//! added to the generator invocation). `--user` restricts the run to the
//! rootless pass. `--json` replaces the text summary with a JSON report.

use std::path::{Path, PathBuf};
use std::process::{self, Command};

use quadcheck::{
    parse_dependencies, service_file_name, template_file_name, GeneratorRun, Outcome, UnitKind,
};
use serde::Serialize;
use tracing::debug;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            process::exit(1);
        }
    };

    match run(&options) {
        Ok(report) => {
            if options.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: cannot serialize report: {e}");
                        process::exit(1);
                    }
                }
            } else {
                print_report(&report);
            }
            if report.failed > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("usage: quadcheck [--user] [--json] <testcases-dir> <generator-bin>");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Options
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct Options {
    testcases_dir: PathBuf,
    generator_bin: PathBuf,
    rootless_only: bool,
    json: bool,
}

impl Options {
    /// Returns `Ok(None)` when help was requested.
    fn parse(args: impl Iterator<Item = String>) -> Result<Option<Self>, String> {
        let mut rootless_only = false;
        let mut json = false;
        let mut positional = Vec::new();

        for arg in args {
            match arg.as_str() {
                "--user" => rootless_only = true,
                "--json" => json = true,
                "--help" | "-h" => return Ok(None),
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag \"{other}\""));
                }
                _ => positional.push(arg),
            }
        }

        match positional.as_slice() {
            [dir, bin] => Ok(Some(Self {
                testcases_dir: PathBuf::from(dir),
                generator_bin: PathBuf::from(bin),
                rootless_only,
                json,
            })),
            [] => Err("no testcases dir given".to_string()),
            [_] => Err("no generator given".to_string()),
            _ => Err("too many arguments".to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Report
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct CaseReport {
    name: String,
    rootless: bool,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Serialize)]
struct SuiteReport {
    passed: usize,
    failed: usize,
    cases: Vec<CaseReport>,
}

fn print_report(report: &SuiteReport) {
    for case in &report.cases {
        if case.passed {
            continue;
        }
        let pass = if case.rootless { "rootless" } else { "rootful" };
        println!("FAIL [{pass}] {}", case.name);
        if let Some(message) = &case.message {
            for line in message.lines() {
                println!("    {line}");
            }
        }
        println!();
    }
    println!(
        "{} passed, {} failed, {} total",
        report.passed,
        report.failed,
        report.passed + report.failed
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Suite
// ═══════════════════════════════════════════════════════════════════════════════

fn run(options: &Options) -> Result<SuiteReport, String> {
    let fixtures = discover(&options.testcases_dir)?;
    if fixtures.is_empty() {
        return Err(format!(
            "no testcases found under {}",
            options.testcases_dir.display()
        ));
    }

    let mut cases = Vec::new();
    let passes: &[bool] = if options.rootless_only {
        &[true]
    } else {
        &[false, true]
    };
    for &rootless in passes {
        for fixture in &fixtures {
            let result = run_case(options, fixture, rootless);
            cases.push(CaseReport {
                name: fixture.display().to_string(),
                rootless,
                passed: result.is_ok(),
                message: result.err(),
            });
        }
    }

    let passed = cases.iter().filter(|c| c.passed).count();
    Ok(SuiteReport {
        passed,
        failed: cases.len() - passed,
        cases,
    })
}

/// Recursively collect fixture paths, relative to the testcases root.
fn discover(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let mut fixtures = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(|e| format!("cannot walk {}: {e}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if UnitKind::from_path(entry.path()).is_none() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| e.to_string())?
            .to_path_buf();
        fixtures.push(rel);
    }
    fixtures.sort();
    Ok(fixtures)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Single case
// ═══════════════════════════════════════════════════════════════════════════════

fn run_case(options: &Options, fixture: &Path, rootless: bool) -> Result<(), String> {
    let fixture_path = options.testcases_dir.join(fixture);
    let data = std::fs::read_to_string(&fixture_path)
        .map_err(|e| format!("cannot read {}: {e}", fixture_path.display()))?;
    let service_name = service_file_name(fixture, &data);
    let dependencies = parse_dependencies(&data).map_err(|e| e.to_string())?;

    // Sandbox layout: <tmp>/subtest-0/{quadlet,out}. Dropped on all exit
    // paths, including evaluation failure.
    let sandbox = tempfile::Builder::new()
        .prefix("quadcheck-")
        .tempdir()
        .map_err(|e| format!("cannot create sandbox: {e}"))?;
    let base = sandbox.path().join("subtest-0");
    let indir = base.join("quadlet");
    let outdir = base.join("out");
    std::fs::create_dir_all(&indir).map_err(|e| e.to_string())?;
    std::fs::create_dir_all(&outdir).map_err(|e| e.to_string())?;

    populate_input_dir(options, fixture, &data, &dependencies, &indir)?;

    debug!(case = %fixture.display(), rootless, "running generator");
    let mut command = Command::new(&options.generator_bin);
    if rootless {
        command.arg("--user");
    }
    command.arg("--no-kmsg-log").arg("-v").arg(&outdir);
    command.env_clear().env("QUADLET_UNIT_DIRS", &indir);
    if let Ok(podman) = std::env::var("PODMAN") {
        command.env("PODMAN", podman);
    }

    let output = command
        .output()
        .map_err(|e| format!("cannot run {}: {e}", options.generator_bin.display()))?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let run = GeneratorRun {
        output: combined,
        success: output.status.success(),
    };

    let dependency_services = dependency_service_names(options, &dependencies)?;
    Outcome::new(&data, service_name, run, &outdir, &dependency_services)
        .and_then(Outcome::check)
        .map_err(|e| e.to_string())
}

/// Write the fixture, its snippet directories, and its dependencies into
/// the sandbox input directory.
fn populate_input_dir(
    options: &Options,
    fixture: &Path,
    data: &str,
    dependencies: &[String],
    indir: &Path,
) -> Result<(), String> {
    let dest = indir.join(fixture);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(&dest, data).map_err(|e| format!("cannot write {}: {e}", dest.display()))?;

    // Snippet drop-ins: <fixture>.d, and for template instances the generic
    // template's <name>@.<ext>.d as well.
    let mut snippet_dirs = vec![format!("{}.d", fixture.display())];
    if let Some(template) = template_file_name(fixture) {
        snippet_dirs.push(format!("{template}.d"));
    }
    for snippet in snippet_dirs {
        let src = options.testcases_dir.join(&snippet);
        if src.is_dir() {
            copy_tree(&src, &indir.join(&snippet))?;
        }
    }

    for dep in dependencies {
        let src = options.testcases_dir.join(dep);
        let dst = indir.join(dep);
        std::fs::copy(&src, &dst)
            .map_err(|e| format!("cannot copy dependency {}: {e}", src.display()))?;
    }
    Ok(())
}

fn dependency_service_names(
    options: &Options,
    dependencies: &[String],
) -> Result<Vec<String>, String> {
    dependencies
        .iter()
        .map(|dep| {
            let path = options.testcases_dir.join(dep);
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot read dependency {}: {e}", path.display()))?;
            Ok(service_file_name(Path::new(dep), &text))
        })
        .collect()
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dst).map_err(|e| e.to_string())?;
    for entry in std::fs::read_dir(src).map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| format!("cannot copy {}: {e}", entry.path().display()))?;
        }
    }
    Ok(())
}
