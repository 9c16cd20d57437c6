//! Assertion directives
//!
//! Fixtures declare assertions as specially prefixed comment lines:
//!
//! ```text
//! ## assert-podman-args run
//! ## !assert-podman-args --privileged
//! ## assert-key-is Service Restart always
//! ```
//!
//! A directive line starts with `##`; the remainder is shell-tokenized and
//! the first token must name a registered operation, optionally prefixed
//! with `!` for negation. `## depends-on <file...>` lines are not
//! assertions; they declare fixture dependencies and are collected by
//! [`parse_dependencies`]. Any other `##` comment is ignored.
//!
//! The operation set is closed: an unregistered name is a fixture bug and
//! aborts the case, which is deliberately distinct from an assertion
//! evaluating false.

use std::path::Path;

use regex::Regex;

use crate::{key_val, seq_match, ExecArgs, ExecField, ExpectedFileSet, UnitFile, VerifyError};

/// Exact vs. regex-per-token comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Element-wise string equality.
    Exact,
    /// Each expected element is a regex searched within the actual element.
    Regex,
}

/// Which region of an argument vector a sequence check inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Anywhere in the vector.
    Anywhere,
    /// Only before the first occurrence of the subcommand anchor.
    GlobalOnly,
    /// Anchored at the exact tail of the vector.
    Final,
}

/// The typed operation a directive name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `assert-failed` — declaration marker; the expected-failure branch is
    /// handled by the outcome evaluator before directives run.
    Failed,
    /// `assert-stderr-contains <substr>`
    StderrContains,
    /// `assert-has-key <section> <key> <value>`
    HasKey,
    /// `assert-key-is[-regex] <section> <key> <value...>`
    KeyIs(Mode),
    /// `assert-key-is-empty <section> <key>`
    KeyIsEmpty,
    /// `assert-last-key-contains <section> <key> <substr>`
    LastKeyContains,
    /// `assert-last-key-is-regex <section> <key> <pattern>`
    LastKeyIsRegex,
    /// The `assert-podman-*-args*` family: sequence search over one exec
    /// field's argument vector.
    ExecSeq {
        /// The argument vector to search.
        field: ExecField,
        /// Exact or regex comparison.
        mode: Mode,
        /// Search region.
        scope: Scope,
    },
    /// The `assert-podman-*-args-key-val*` family: key-value blob scan over
    /// one exec field's argument vector.
    ExecKeyVal {
        /// The argument vector to scan.
        field: ExecField,
        /// Exact or regex value comparison.
        mode: Mode,
        /// Restrict the scan to the region before the option's first
        /// occurrence.
        global_only: bool,
    },
    /// `assert-symlink <link> <target>`
    Symlink,
}

/// One parsed assertion from a fixture.
#[derive(Debug, Clone)]
pub struct Directive {
    /// The directive re-joined with shell quoting, for diagnostics.
    pub raw: String,
    /// Whether the operation name carried a `!` prefix.
    pub negated: bool,
    /// The resolved operation.
    pub kind: DirectiveKind,
    /// Arguments following the operation name.
    pub args: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

use DirectiveKind::{ExecKeyVal, ExecSeq};
use ExecField::{Reload, Start, StartPre, Stop, StopPost};

const fn seq(field: ExecField, mode: Mode, scope: Scope) -> DirectiveKind {
    ExecSeq { field, mode, scope }
}

const fn kv(field: ExecField, mode: Mode, global_only: bool) -> DirectiveKind {
    ExecKeyVal {
        field,
        mode,
        global_only,
    }
}

/// The closed directive name table.
///
/// Field coverage is uneven on purpose: only the variants real fixtures use
/// exist (stop and stop-post have no plain regex or global regex forms,
/// reload has no plain regex form).
const REGISTRY: &[(&str, DirectiveKind)] = &[
    ("assert-failed", DirectiveKind::Failed),
    ("assert-stderr-contains", DirectiveKind::StderrContains),
    ("assert-has-key", DirectiveKind::HasKey),
    ("assert-key-is", DirectiveKind::KeyIs(Mode::Exact)),
    ("assert-key-is-empty", DirectiveKind::KeyIsEmpty),
    ("assert-key-is-regex", DirectiveKind::KeyIs(Mode::Regex)),
    ("assert-last-key-contains", DirectiveKind::LastKeyContains),
    ("assert-last-key-is-regex", DirectiveKind::LastKeyIsRegex),
    // start
    ("assert-podman-args", seq(Start, Mode::Exact, Scope::Anywhere)),
    ("assert-podman-args-regex", seq(Start, Mode::Regex, Scope::Anywhere)),
    ("assert-podman-args-key-val", kv(Start, Mode::Exact, false)),
    ("assert-podman-args-key-val-regex", kv(Start, Mode::Regex, false)),
    ("assert-podman-global-args", seq(Start, Mode::Exact, Scope::GlobalOnly)),
    ("assert-podman-global-args-regex", seq(Start, Mode::Regex, Scope::GlobalOnly)),
    ("assert-podman-global-args-key-val", kv(Start, Mode::Exact, true)),
    ("assert-podman-global-args-key-val-regex", kv(Start, Mode::Regex, true)),
    ("assert-podman-final-args", seq(Start, Mode::Exact, Scope::Final)),
    ("assert-podman-final-args-regex", seq(Start, Mode::Regex, Scope::Final)),
    // start-pre
    ("assert-podman-pre-args", seq(StartPre, Mode::Exact, Scope::Anywhere)),
    ("assert-podman-pre-args-regex", seq(StartPre, Mode::Regex, Scope::Anywhere)),
    ("assert-podman-pre-args-key-val", kv(StartPre, Mode::Exact, false)),
    ("assert-podman-pre-args-key-val-regex", kv(StartPre, Mode::Regex, false)),
    ("assert-podman-pre-global-args", seq(StartPre, Mode::Exact, Scope::GlobalOnly)),
    ("assert-podman-pre-global-args-regex", seq(StartPre, Mode::Regex, Scope::GlobalOnly)),
    ("assert-podman-pre-global-args-key-val", kv(StartPre, Mode::Exact, true)),
    ("assert-podman-pre-global-args-key-val-regex", kv(StartPre, Mode::Regex, true)),
    ("assert-podman-pre-final-args", seq(StartPre, Mode::Exact, Scope::Final)),
    ("assert-podman-pre-final-args-regex", seq(StartPre, Mode::Regex, Scope::Final)),
    // reload
    ("assert-podman-reload-args", seq(Reload, Mode::Exact, Scope::Anywhere)),
    ("assert-podman-reload-global-args", seq(Reload, Mode::Exact, Scope::GlobalOnly)),
    ("assert-podman-reload-final-args", seq(Reload, Mode::Exact, Scope::Final)),
    ("assert-podman-reload-final-args-regex", seq(Reload, Mode::Regex, Scope::Final)),
    ("assert-podman-reload-args-key-val", kv(Reload, Mode::Exact, false)),
    ("assert-podman-reload-args-key-val-regex", kv(Reload, Mode::Regex, false)),
    // stop
    ("assert-podman-stop-args", seq(Stop, Mode::Exact, Scope::Anywhere)),
    ("assert-podman-stop-global-args", seq(Stop, Mode::Exact, Scope::GlobalOnly)),
    ("assert-podman-stop-final-args", seq(Stop, Mode::Exact, Scope::Final)),
    ("assert-podman-stop-final-args-regex", seq(Stop, Mode::Regex, Scope::Final)),
    ("assert-podman-stop-args-key-val", kv(Stop, Mode::Exact, false)),
    ("assert-podman-stop-args-key-val-regex", kv(Stop, Mode::Regex, false)),
    // stop-post
    ("assert-podman-stop-post-args", seq(StopPost, Mode::Exact, Scope::Anywhere)),
    ("assert-podman-stop-post-global-args", seq(StopPost, Mode::Exact, Scope::GlobalOnly)),
    ("assert-podman-stop-post-final-args", seq(StopPost, Mode::Exact, Scope::Final)),
    ("assert-podman-stop-post-final-args-regex", seq(StopPost, Mode::Regex, Scope::Final)),
    ("assert-podman-stop-post-args-key-val", kv(StopPost, Mode::Exact, false)),
    ("assert-podman-stop-post-args-key-val-regex", kv(StopPost, Mode::Regex, false)),
    ("assert-symlink", DirectiveKind::Symlink),
];

fn lookup(name: &str) -> Option<DirectiveKind> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, kind)| *kind)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Scan fixture text for assertion directives, in declaration order.
///
/// # Errors
///
/// Returns [`VerifyError::BadDirectiveLine`] for a `##` line that cannot be
/// shell-tokenized and [`VerifyError::UnknownDirective`] for an assertion
/// name outside the registry.
pub fn parse_directives(fixture: &str) -> Result<Vec<Directive>, VerifyError> {
    let mut directives = Vec::new();
    for line in fixture.split('\n') {
        let Some(rest) = line.strip_prefix("##") else {
            continue;
        };
        let words = shell_words::split(rest).map_err(|e| VerifyError::BadDirectiveLine {
            line: line.to_string(),
            source: e.to_string(),
        })?;
        let Some(op) = words.first() else {
            continue;
        };
        let name = op.strip_prefix('!').unwrap_or(op);
        if !name.starts_with("assert-") {
            continue;
        }
        let kind = lookup(name).ok_or_else(|| VerifyError::UnknownDirective {
            name: name.to_string(),
        })?;
        directives.push(Directive {
            raw: shell_words::join(words.iter().map(String::as_str)),
            negated: op.starts_with('!'),
            kind,
            args: words[1..].to_vec(),
        });
    }
    Ok(directives)
}

/// Collect `## depends-on` declarations from fixture text.
///
/// Each declaration names one or more sibling fixture files whose generated
/// outputs are expected alongside this case's own.
///
/// # Errors
///
/// Returns [`VerifyError::BadDirectiveLine`] for a declaration that cannot
/// be shell-tokenized.
pub fn parse_dependencies(fixture: &str) -> Result<Vec<String>, VerifyError> {
    let mut deps = Vec::new();
    for line in fixture.split('\n') {
        let Some(rest) = line.strip_prefix("## depends-on ") else {
            continue;
        };
        let words = shell_words::split(rest).map_err(|e| VerifyError::BadDirectiveLine {
            line: line.to_string(),
            source: e.to_string(),
        })?;
        deps.extend(words);
    }
    Ok(deps)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a directive may inspect or register against.
pub struct EvalContext<'a> {
    /// Captured combined stdout+stderr of the generator run.
    pub stdout: &'a str,
    /// The parsed output file.
    pub unit: &'a UnitFile,
    /// The bound exec argument vectors.
    pub exec: &'a ExecArgs,
    /// The output directory root, for symlink checks.
    pub outdir: &'a Path,
    /// The declared-expected path set; symlink checks register into it.
    pub expected_files: &'a mut ExpectedFileSet,
}

impl Directive {
    /// Evaluate this directive, applying its negation.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidPattern`] when a regex argument does
    /// not compile. Wrong argument counts evaluate to false rather than
    /// erroring, so a negated directive can still pass.
    pub fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<bool, VerifyError> {
        let verdict = self.evaluate_op(ctx)?;
        Ok(verdict != self.negated)
    }

    fn evaluate_op(&self, ctx: &mut EvalContext<'_>) -> Result<bool, VerifyError> {
        let args = &self.args;
        match self.kind {
            DirectiveKind::Failed => Ok(true),
            DirectiveKind::StderrContains => {
                Ok(args.first().is_some_and(|s| ctx.stdout.contains(s.as_str())))
            }
            DirectiveKind::HasKey => {
                let [section, key, value] = args.as_slice() else {
                    return Ok(false);
                };
                Ok(ctx
                    .unit
                    .lookup(section, key)
                    .is_some_and(|values| values.contains(value)))
            }
            DirectiveKind::KeyIs(mode) => {
                if args.len() < 3 {
                    return Ok(false);
                }
                let (section, key, expected) = (&args[0], &args[1], &args[2..]);
                let Some(actual) = ctx.unit.lookup(section, key) else {
                    return Ok(false);
                };
                match mode {
                    Mode::Exact => Ok(actual == expected),
                    Mode::Regex => {
                        if actual.len() != expected.len() {
                            return Ok(false);
                        }
                        for (pattern, value) in expected.iter().zip(actual) {
                            if !regex_found(pattern, value)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                }
            }
            DirectiveKind::KeyIsEmpty => {
                if args.len() < 2 {
                    return Ok(false);
                }
                Ok(ctx
                    .unit
                    .lookup(&args[0], &args[1])
                    .is_none_or(<[String]>::is_empty))
            }
            DirectiveKind::LastKeyContains => {
                let [section, key, value] = args.as_slice() else {
                    return Ok(false);
                };
                Ok(ctx
                    .unit
                    .last_value(section, key)
                    .is_some_and(|last| last.contains(value.as_str())))
            }
            DirectiveKind::LastKeyIsRegex => {
                let [section, key, pattern] = args.as_slice() else {
                    return Ok(false);
                };
                match ctx.unit.last_value(section, key) {
                    Some(last) => regex_found(pattern, last),
                    None => Ok(false),
                }
            }
            DirectiveKind::ExecSeq { field, mode, scope } => {
                eval_exec_seq(ctx.exec.get(field), args, mode, scope)
            }
            DirectiveKind::ExecKeyVal {
                field,
                mode,
                global_only,
            } => eval_exec_key_val(ctx.exec.get(field), args, mode, global_only),
            DirectiveKind::Symlink => eval_symlink(ctx, args),
        }
    }
}

fn eval_exec_seq(
    haystack: &[String],
    args: &[String],
    mode: Mode,
    scope: Scope,
) -> Result<bool, VerifyError> {
    match scope {
        Scope::Final => match mode {
            Mode::Exact => Ok(seq_match::match_final(haystack, args)),
            Mode::Regex => seq_match::match_final_regex(haystack, args),
        },
        Scope::Anywhere => match mode {
            Mode::Exact => Ok(seq_match::find_sub(haystack, args).is_some()),
            Mode::Regex => Ok(seq_match::find_sub_regex(haystack, args)?.is_some()),
        },
        Scope::GlobalOnly => {
            let Some(anchor) = args.first() else {
                return Ok(false);
            };
            let Some(region) = seq_match::global_region(haystack, anchor) else {
                return Ok(false);
            };
            let needle = &args[1..];
            match mode {
                Mode::Exact => Ok(seq_match::find_sub(region, needle).is_some()),
                Mode::Regex => Ok(seq_match::find_sub_regex(region, needle)?.is_some()),
            }
        }
    }
}

fn eval_exec_key_val(
    haystack: &[String],
    args: &[String],
    mode: Mode,
    global_only: bool,
) -> Result<bool, VerifyError> {
    let [opt, separator, values] = args else {
        return Ok(false);
    };
    let mut sep_chars = separator.chars();
    let sep = match (sep_chars.next(), sep_chars.next()) {
        (Some(c), None) => c,
        _ => return Ok(false),
    };

    // The scan region for the global variant ends before the option's first
    // occurrence; a region that by construction cannot contain the option
    // only ever satisfies a negated directive.
    let haystack = if global_only {
        match haystack.iter().position(|token| token == opt) {
            Some(i) => &haystack[..i],
            None => return Ok(false),
        }
    } else {
        haystack
    };

    let expected = key_val::key_value_map(values, sep);
    key_val::match_key_val(haystack, opt, sep, &expected, mode == Mode::Regex)
}

fn eval_symlink(ctx: &mut EvalContext<'_>, args: &[String]) -> Result<bool, VerifyError> {
    let [link, target] = args else {
        return Ok(false);
    };

    // Registered regardless of the verdict, so a broken link still shows up
    // in reconciliation diagnostics rather than as a surplus file.
    ctx.expected_files.add(link);

    let path = ctx.outdir.join(link);
    let Ok(meta) = std::fs::symlink_metadata(&path) else {
        return Ok(false);
    };
    if !meta.file_type().is_symlink() {
        return Ok(false);
    }
    match std::fs::read_link(&path) {
        Ok(actual) => Ok(actual.as_os_str() == std::ffi::OsStr::new(target)),
        Err(_) => Ok(false),
    }
}

fn regex_found(pattern: &str, value: &str) -> Result<bool, VerifyError> {
    let re = Regex::new(pattern).map_err(|e| VerifyError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e.to_string(),
    })?;
    Ok(re.find(value).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(line: &str) -> Directive {
        let mut directives = parse_directives(line).unwrap();
        assert_eq!(directives.len(), 1);
        directives.remove(0)
    }

    fn fixture_unit() -> UnitFile {
        UnitFile::parse(
            "[Service]\n\
             ExecStart=/usr/bin/podman run --name=x --security-opt label=disable img\n\
             ExecStop=/usr/bin/podman stop x\n\
             Restart=always\n\
             Environment=A=1\n\
             Environment=B=2\n",
        )
    }

    fn check(line: &str, stdout: &str) -> Result<bool, VerifyError> {
        let unit = fixture_unit();
        let exec = ExecArgs::bind(&unit).unwrap();
        let mut expected_files = ExpectedFileSet::new();
        let mut ctx = EvalContext {
            stdout,
            unit: &unit,
            exec: &exec,
            outdir: Path::new("/nonexistent"),
            expected_files: &mut expected_files,
        };
        parse_one(line).evaluate(&mut ctx)
    }

    #[test]
    fn parses_negation_and_args() {
        let d = parse_one("## !assert-podman-args --privileged\n");
        assert!(d.negated);
        assert_eq!(d.kind, seq(Start, Mode::Exact, Scope::Anywhere));
        assert_eq!(d.args, ["--privileged"]);
        assert!(d.raw.contains("assert-podman-args"));
    }

    #[test]
    fn quoted_arguments_survive_tokenization() {
        let d = parse_one("## assert-key-is Unit Description \"a b c\"\n");
        assert_eq!(d.args, ["Unit", "Description", "a b c"]);
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let err = parse_directives("## assert-bogus x\n").unwrap_err();
        assert_eq!(
            err,
            VerifyError::UnknownDirective {
                name: "assert-bogus".to_string()
            }
        );
    }

    #[test]
    fn plain_comments_are_ignored() {
        assert!(parse_directives("# one hash\n## just a note\n## depends-on x.volume\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn declaration_order_is_preserved() {
        let directives =
            parse_directives("## assert-failed\n[X]\n## assert-stderr-contains warn\n").unwrap();
        assert_eq!(directives[0].kind, DirectiveKind::Failed);
        assert_eq!(directives[1].kind, DirectiveKind::StderrContains);
    }

    #[test]
    fn dependencies_are_collected() {
        let deps =
            parse_dependencies("## depends-on a.volume b.network\n## depends-on c.container\n")
                .unwrap();
        assert_eq!(deps, ["a.volume", "b.network", "c.container"]);
    }

    #[test]
    fn every_registered_name_resolves() {
        for (name, kind) in REGISTRY {
            assert_eq!(lookup(name), Some(*kind));
        }
        assert_eq!(REGISTRY.len(), 47);
    }

    #[test]
    fn stderr_contains() {
        assert!(check("## assert-stderr-contains warning", "a warning here").unwrap());
        assert!(!check("## assert-stderr-contains error", "all fine").unwrap());
    }

    #[test]
    fn has_key_matches_any_value() {
        assert!(check("## assert-has-key Service Environment B=2", "").unwrap());
        assert!(!check("## assert-has-key Service Environment C=3", "").unwrap());
        assert!(!check("## assert-has-key Service Missing x", "").unwrap());
    }

    #[test]
    fn key_is_compares_whole_list() {
        assert!(check("## assert-key-is Service Environment A=1 B=2", "").unwrap());
        assert!(!check("## assert-key-is Service Environment A=1", "").unwrap());
        assert!(check("## assert-key-is-regex Service Restart ^al", "").unwrap());
    }

    #[test]
    fn key_is_empty_accepts_missing_key() {
        assert!(check("## assert-key-is-empty Service Missing", "").unwrap());
        assert!(!check("## assert-key-is-empty Service Restart", "").unwrap());
    }

    #[test]
    fn last_key_checks_final_value_only() {
        assert!(check("## assert-last-key-contains Service Environment B=", "").unwrap());
        assert!(!check("## assert-last-key-contains Service Environment A=", "").unwrap());
        assert!(check("## assert-last-key-is-regex Service Environment ^B=2$", "").unwrap());
    }

    #[test]
    fn exec_seq_variants() {
        assert!(check("## assert-podman-args run --name=x", "").unwrap());
        assert!(check("## assert-podman-args-regex run --name=.*", "").unwrap());
        assert!(check("## assert-podman-final-args label=disable img", "").unwrap());
        assert!(!check("## assert-podman-final-args run", "").unwrap());
        assert!(check("## assert-podman-stop-args stop x", "").unwrap());
    }

    #[test]
    fn negation_flips_the_verdict() {
        assert!(check("## !assert-podman-args --privileged", "").unwrap());
        assert!(!check("## !assert-podman-args run", "").unwrap());
    }

    #[test]
    fn global_args_fail_without_global_region() {
        // run sits right after the program token
        assert!(!check("## assert-podman-global-args run --log-level=debug", "").unwrap());
        assert!(check("## !assert-podman-global-args run --log-level=debug", "").unwrap());
    }

    #[test]
    fn exec_key_val_scans_occurrences() {
        assert!(check(
            "## assert-podman-args-key-val --security-opt , label=disable",
            ""
        )
        .unwrap());
        assert!(!check(
            "## assert-podman-args-key-val --security-opt , label=enable",
            ""
        )
        .unwrap());
    }

    #[test]
    fn exec_key_val_wrong_arity_is_false() {
        assert!(!check("## assert-podman-args-key-val --security-opt ,", "").unwrap());
    }

    #[test]
    fn invalid_regex_is_a_configuration_error() {
        let err = check("## assert-podman-args-regex [bad", "").unwrap_err();
        assert!(matches!(err, VerifyError::InvalidPattern { .. }));
    }

    #[test]
    fn bad_quoting_in_directive_is_fatal() {
        let err = parse_directives("## assert-podman-args \"unterminated\n").unwrap_err();
        assert!(matches!(err, VerifyError::BadDirectiveLine { .. }));
    }
}
