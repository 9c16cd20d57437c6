//! End-to-end conformance tests for the outcome evaluator
//!
//! Each test builds a real output directory, hands the evaluator a fixture
//! text plus a simulated generator run, and checks the verdict.

use std::path::Path;

use quadcheck::{CaseFailure, GeneratorRun, Outcome, VerifyError};
use tempfile::TempDir;

fn write_service(outdir: &Path, name: &str, text: &str) {
    std::fs::write(outdir.join(name), text).unwrap();
}

fn run_ok() -> GeneratorRun {
    GeneratorRun {
        output: String::new(),
        success: true,
    }
}

fn evaluate(fixture: &str, service_name: &str, outdir: &Path) -> Result<(), CaseFailure> {
    Outcome::new(fixture, service_name, run_ok(), outdir, &[])?.check()
}

const BASIC_SERVICE: &str = "\
[Unit]
Description=basic
[Service]
ExecStart=/usr/bin/podman run --rm --name=basic localhost/img
Restart=always
";

#[test]
fn passing_case() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);

    let fixture = "\
[Container]
Image=localhost/img
## assert-podman-args run --rm
## assert-podman-final-args localhost/img
## assert-key-is Service Restart always
";
    evaluate(fixture, "basic.service", dir.path()).unwrap();
}

#[test]
fn failing_directive_names_itself() {
    // create vs. run: the final-args anchor must not match
    let fixture = "## assert-podman-final-args run --rm localhost/img\n";
    let service = "[Service]\nExecStart=podman create --rm localhost/img\n";
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", service);

    let err = evaluate(fixture, "basic.service", dir.path()).unwrap_err();
    match &err.error {
        VerifyError::AssertionFailed { directive } => {
            assert!(directive.contains("assert-podman-final-args"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn diagnostics_carry_output_and_contents() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);

    let run = GeneratorRun {
        output: "converting basic.container\n".to_string(),
        success: true,
    };
    let err = Outcome::new(
        "## assert-podman-args --privileged\n",
        "basic.service",
        run,
        dir.path(),
        &[],
    )
    .unwrap()
    .check()
    .unwrap_err();

    let text = err.to_string();
    assert!(text.contains("assert-podman-args"));
    assert!(text.contains("--- STDOUT/ERR ---"));
    assert!(text.contains("converting basic.container"));
    assert!(text.contains("contents of basic.service"));
    assert!(text.contains("ExecStart="));
}

#[test]
fn expected_failure_passes_without_output() {
    let dir = TempDir::new().unwrap();
    let run = GeneratorRun {
        output: "conversion failed\n".to_string(),
        success: false,
    };
    Outcome::new("## assert-failed\n", "bad.service", run, dir.path(), &[])
        .unwrap()
        .check()
        .unwrap();
}

#[test]
fn expected_failure_rejects_canonical_output() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "bad.service", BASIC_SERVICE);

    let err = evaluate("## assert-failed\n", "bad.service", dir.path()).unwrap_err();
    assert!(matches!(err.error, VerifyError::UnexpectedSuccess { .. }));
}

#[test]
fn expected_failure_rejects_any_output_file() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "other-name.service", BASIC_SERVICE);

    let err = evaluate("## assert-failed\n", "bad.service", dir.path()).unwrap_err();
    assert!(matches!(err.error, VerifyError::UnexpectedSuccess { .. }));
}

#[test]
fn generator_failure_without_marker_is_fatal() {
    let dir = TempDir::new().unwrap();
    let run = GeneratorRun {
        output: "boom\n".to_string(),
        success: false,
    };
    let err = Outcome::new("", "x.service", run, dir.path(), &[]).unwrap_err();
    assert_eq!(err.error, VerifyError::GeneratorFailed);
}

#[test]
fn missing_output_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = evaluate("", "absent.service", dir.path()).unwrap_err();
    assert_eq!(
        err.error,
        VerifyError::OutputNotFound {
            name: "absent.service".to_string()
        }
    );
}

#[test]
fn single_service_fallback_renames() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "surprise.service", BASIC_SERVICE);

    // canonical name misses, but exactly one .service file exists
    evaluate("## assert-podman-args run\n", "expected.service", dir.path()).unwrap();
}

#[test]
fn ambiguous_fallback_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "one.service", BASIC_SERVICE);
    write_service(dir.path(), "two.service", BASIC_SERVICE);

    let err = evaluate("", "expected.service", dir.path()).unwrap_err();
    assert_eq!(err.error, VerifyError::OutputAmbiguous { count: 2 });
}

#[test]
fn surplus_file_fails_reconciliation() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);
    std::fs::write(dir.path().join("z.txt"), "stray").unwrap();

    let err = evaluate("", "basic.service", dir.path()).unwrap_err();
    assert_eq!(
        err.error,
        VerifyError::UnexpectedFiles {
            paths: vec!["z.txt".to_string()]
        }
    );
}

#[test]
fn declared_dependency_output_is_required() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);

    let deps = vec!["dep-volume.service".to_string()];
    let err = Outcome::new("", "basic.service", run_ok(), dir.path(), &deps)
        .unwrap()
        .check()
        .unwrap_err();
    assert_eq!(
        err.error,
        VerifyError::MissingExpectedFile {
            path: "dep-volume.service".to_string()
        }
    );

    write_service(dir.path(), "dep-volume.service", "[Service]\n");
    Outcome::new("", "basic.service", run_ok(), dir.path(), &deps)
        .unwrap()
        .check()
        .unwrap();
}

#[cfg(unix)]
#[test]
fn symlink_assertion_checks_target_and_registers_path() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);
    let wants = dir.path().join("default.target.wants");
    std::fs::create_dir(&wants).unwrap();
    std::os::unix::fs::symlink("../basic.service", wants.join("basic.service")).unwrap();

    let fixture = "## assert-symlink default.target.wants/basic.service ../basic.service\n";
    evaluate(fixture, "basic.service", dir.path()).unwrap();

    let wrong = "## assert-symlink default.target.wants/basic.service ../other.service\n";
    let err = evaluate(wrong, "basic.service", dir.path()).unwrap_err();
    assert!(matches!(err.error, VerifyError::AssertionFailed { .. }));
}

#[cfg(unix)]
#[test]
fn unregistered_symlink_is_surplus() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);
    let wants = dir.path().join("default.target.wants");
    std::fs::create_dir(&wants).unwrap();
    std::os::unix::fs::symlink("../basic.service", wants.join("basic.service")).unwrap();

    let err = evaluate("", "basic.service", dir.path()).unwrap_err();
    assert!(matches!(err.error, VerifyError::UnexpectedFiles { .. }));
}

#[test]
fn negated_directive_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);

    evaluate("## !assert-podman-args --privileged\n", "basic.service", dir.path()).unwrap();

    let err = evaluate("## !assert-podman-args run\n", "basic.service", dir.path()).unwrap_err();
    assert!(matches!(err.error, VerifyError::AssertionFailed { .. }));
}

#[test]
fn stderr_contains_checks_captured_output() {
    let dir = TempDir::new().unwrap();
    write_service(dir.path(), "basic.service", BASIC_SERVICE);

    let run = GeneratorRun {
        output: "warning: deprecated key\n".to_string(),
        success: true,
    };
    Outcome::new(
        "## assert-stderr-contains deprecated\n",
        "basic.service",
        run,
        dir.path(),
        &[],
    )
    .unwrap()
    .check()
    .unwrap();
}

#[test]
fn unknown_directive_is_distinct_from_assertion_failure() {
    let dir = TempDir::new().unwrap();
    let err = Outcome::new("## assert-no-such-op\n", "x.service", run_ok(), dir.path(), &[])
        .unwrap_err();
    assert_eq!(
        err.error,
        VerifyError::UnknownDirective {
            name: "assert-no-such-op".to_string()
        }
    );
}

#[test]
fn global_scope_checks_region_before_subcommand() {
    let dir = TempDir::new().unwrap();
    let service = "[Service]\nExecStart=podman --log-level=debug run localhost/img\n";
    write_service(dir.path(), "g.service", service);

    evaluate(
        "## assert-podman-global-args run --log-level=debug\n",
        "g.service",
        dir.path(),
    )
    .unwrap();

    // subcommand right after the program token: no global region
    let dir2 = TempDir::new().unwrap();
    let service = "[Service]\nExecStart=podman run --log-level=debug localhost/img\n";
    write_service(dir2.path(), "g.service", service);

    let err = evaluate(
        "## assert-podman-global-args run --log-level=debug\n",
        "g.service",
        dir2.path(),
    )
    .unwrap_err();
    assert!(matches!(err.error, VerifyError::AssertionFailed { .. }));
}

#[test]
fn continuation_and_comments_in_generated_output() {
    let dir = TempDir::new().unwrap();
    let service = "\
# generated by quadlet
[Service]
ExecStart=podman run \\
  --name=joined localhost/img
";
    write_service(dir.path(), "j.service", service);

    evaluate(
        "## assert-podman-args run --name=joined localhost/img\n",
        "j.service",
        dir.path(),
    )
    .unwrap();
}

#[test]
fn key_val_assertion_end_to_end() {
    let dir = TempDir::new().unwrap();
    let service =
        "[Service]\nExecStart=podman run --mount type=bind,source=/data,destination=/data img\n";
    write_service(dir.path(), "kv.service", service);

    evaluate(
        "## assert-podman-args-key-val --mount , type=bind,source=/data,destination=/data\n",
        "kv.service",
        dir.path(),
    )
    .unwrap();

    evaluate(
        "## assert-podman-args-key-val-regex --mount , \"type=bind,source=^/d,destination=/data\"\n",
        "kv.service",
        dir.path(),
    )
    .unwrap();
}
