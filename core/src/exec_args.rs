//! `ExecArgs` — Shell-tokenized argument vectors for exec fields
//!
//! Each exec-style key of the `Service` section tokenizes into one argument
//! vector using POSIX word-splitting rules. Fields the generator did not
//! emit bind to the single placeholder token [`BASE_PROGRAM`], so matchers
//! never see an empty vector.

use crate::{UnitFile, VerifyError};

/// Placeholder program token for absent exec fields.
pub const BASE_PROGRAM: &str = "podman";

/// The exec fields the directive language can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecField {
    /// `ExecStartPre=`
    StartPre,
    /// `ExecStart=`
    Start,
    /// `ExecStop=`
    Stop,
    /// `ExecStopPost=`
    StopPost,
    /// `ExecReload=`
    Reload,
}

impl ExecField {
    /// All addressable fields, in unit-file order.
    pub const ALL: [ExecField; 5] = [
        ExecField::StartPre,
        ExecField::Start,
        ExecField::Stop,
        ExecField::StopPost,
        ExecField::Reload,
    ];

    /// The unit-file key this field reads.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            ExecField::StartPre => "ExecStartPre",
            ExecField::Start => "ExecStart",
            ExecField::Stop => "ExecStop",
            ExecField::StopPost => "ExecStopPost",
            ExecField::Reload => "ExecReload",
        }
    }
}

/// The named argument vectors of one generated service file.
///
/// Immutable once bound; vectors are tokenized exactly once per case.
#[derive(Debug, Clone)]
pub struct ExecArgs {
    start_pre: Vec<String>,
    start: Vec<String>,
    stop: Vec<String>,
    stop_post: Vec<String>,
    reload: Vec<String>,
}

impl ExecArgs {
    /// Tokenize every exec field of `unit`'s `Service` section.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::BadExecValue`] when a recorded value has
    /// unbalanced quoting.
    pub fn bind(unit: &UnitFile) -> Result<Self, VerifyError> {
        let mut vectors: [Vec<String>; 5] = Default::default();
        for (slot, field) in vectors.iter_mut().zip(ExecField::ALL) {
            *slot = tokenize_field(unit, field)?;
        }
        let [start_pre, start, stop, stop_post, reload] = vectors;
        Ok(Self {
            start_pre,
            start,
            stop,
            stop_post,
            reload,
        })
    }

    /// The argument vector bound to `field`.
    #[must_use]
    pub fn get(&self, field: ExecField) -> &[String] {
        match field {
            ExecField::StartPre => &self.start_pre,
            ExecField::Start => &self.start,
            ExecField::Stop => &self.stop,
            ExecField::StopPost => &self.stop_post,
            ExecField::Reload => &self.reload,
        }
    }
}

// Generators may emit the same exec key twice; only the last value is
// authoritative, matching systemd override semantics.
fn tokenize_field(unit: &UnitFile, field: ExecField) -> Result<Vec<String>, VerifyError> {
    let key = field.key();
    match unit.lookup("Service", key).and_then(<[String]>::last) {
        Some(value) => shell_words::split(value).map_err(|e| VerifyError::BadExecValue {
            key: key.to_string(),
            source: e.to_string(),
        }),
        None => Ok(vec![BASE_PROGRAM.to_string()]),
    }
}
