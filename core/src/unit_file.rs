//! `UnitFile` — Order-preserving, multi-valued model of generated INI output
//!
//! Raw generator output goes through [`canonicalize`] (comment stripping,
//! continuation joining) before parsing. Parsing is deliberately lenient:
//! it only needs to support the dialect the generator under test emits, so
//! malformed lines are skipped rather than rejected.

use std::collections::HashMap;

/// Remove comment lines and merge continuation lines.
///
/// A line whose first character is `#` or `;` contributes nothing. A line
/// ending in `\` is joined with the following line, the marker replaced by a
/// single space; continuations chain across any number of lines.
///
/// # Example
///
/// ```
/// use quadcheck::canonicalize;
///
/// let text = "A=foo\\\nbar\n# comment\nB=x\n";
/// assert_eq!(canonicalize(text), "A=foo bar\nB=x\n\n");
/// ```
#[must_use]
pub fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.split('\n') {
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        match line.strip_suffix('\\') {
            Some(joined) => {
                out.push_str(joined);
                out.push(' ');
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

/// Parsed unit file: sections mapping keys to their values in file order.
///
/// Within a section, a key's values preserve order of appearance. A key that
/// never appears has no entry at all, which is distinct from a key recorded
/// with one empty value. Text before the first `[Section]` header belongs to
/// the sentinel section `"none"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFile {
    sections: HashMap<String, HashMap<String, Vec<String>>>,
}

impl UnitFile {
    /// Parse canonicalized unit-file text.
    ///
    /// A line starting with `[` switches the active section to the text up
    /// to the first `]` (left unchanged if the `]` is missing). Any other
    /// line containing `=` is split on the first `=` into a trimmed key and
    /// a trimmed value, appended to the key's value list. Everything else is
    /// skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
        let mut section = "none".to_string();

        for line in text.split('\n') {
            if line.starts_with('[') {
                if let Some(end) = line.find(']') {
                    section = line[1..end].to_string();
                }
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                sections
                    .entry(section.clone())
                    .or_default()
                    .entry(key.trim().to_string())
                    .or_default()
                    .push(value.trim().to_string());
            }
        }

        Self { sections }
    }

    /// All recorded values for `key` in `section`, in file order.
    ///
    /// Returns `None` when the section or key never appeared.
    #[must_use]
    pub fn lookup(&self, section: &str, key: &str) -> Option<&[String]> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
    }

    /// The last recorded value for `key` in `section`.
    #[must_use]
    pub fn last_value(&self, section: &str, key: &str) -> Option<&str> {
        self.lookup(section, key)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Returns `true` if `key` has at least one recorded value in `section`.
    #[must_use]
    pub fn has_key(&self, section: &str, key: &str) -> bool {
        self.lookup(section, key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_key_values() {
        let unit = UnitFile::parse("[Service]\nExecStart=/bin/true\nRestart=always\n");
        assert_eq!(
            unit.lookup("Service", "ExecStart"),
            Some(&["/bin/true".to_string()][..])
        );
        assert_eq!(
            unit.lookup("Service", "Restart"),
            Some(&["always".to_string()][..])
        );
    }

    #[test]
    fn repeated_keys_preserve_file_order() {
        let unit = UnitFile::parse("[Service]\nKey=a\nOther=x\nKey=b\n");
        assert_eq!(
            unit.lookup("Service", "Key"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
    }

    #[test]
    fn text_before_header_lands_in_sentinel_section() {
        let unit = UnitFile::parse("Stray=1\n[Unit]\nDescription=d\n");
        assert_eq!(unit.lookup("none", "Stray"), Some(&["1".to_string()][..]));
        assert_eq!(
            unit.lookup("Unit", "Description"),
            Some(&["d".to_string()][..])
        );
    }

    #[test]
    fn missing_key_is_none_not_empty() {
        let unit = UnitFile::parse("[Service]\nKey=\n");
        assert_eq!(unit.lookup("Service", "Key"), Some(&[String::new()][..]));
        assert_eq!(unit.lookup("Service", "Missing"), None);
        assert_eq!(unit.lookup("Elsewhere", "Key"), None);
    }

    #[test]
    fn key_and_value_are_trimmed() {
        let unit = UnitFile::parse("[S]\n  Key  =  value with spaces  \n");
        assert_eq!(
            unit.lookup("S", "Key"),
            Some(&["value with spaces".to_string()][..])
        );
    }

    #[test]
    fn value_may_contain_equals() {
        let unit = UnitFile::parse("[S]\nEnvironment=FOO=bar\n");
        assert_eq!(
            unit.lookup("S", "Environment"),
            Some(&["FOO=bar".to_string()][..])
        );
    }

    #[test]
    fn canonicalize_strips_comments_anywhere() {
        let text = "# top\n[S]\n; mid\nKey=1\n#tail\n";
        assert_eq!(canonicalize(text), "[S]\nKey=1\n\n");
    }

    #[test]
    fn canonicalize_joins_continuations() {
        let unit = UnitFile::parse(&canonicalize("[S]\nA=foo\\\nbar\n"));
        assert_eq!(unit.lookup("S", "A"), Some(&["foo bar".to_string()][..]));
    }

    #[test]
    fn canonicalize_chains_continuations() {
        let unit = UnitFile::parse(&canonicalize("[S]\nA=a\\\nb\\\nc\n"));
        assert_eq!(unit.lookup("S", "A"), Some(&["a b c".to_string()][..]));
    }

    #[test]
    fn round_trip_without_comments_or_continuations() {
        let text = "[Unit]\nDescription=d\n[Service]\nExecStart=podman run\n";
        let unit = UnitFile::parse(&canonicalize(text));
        assert_eq!(unit, UnitFile::parse(text));
    }

    #[test]
    fn header_without_closing_bracket_keeps_section() {
        let unit = UnitFile::parse("[Good]\nA=1\n[Broken\nB=2\n");
        assert_eq!(unit.lookup("Good", "B"), Some(&["2".to_string()][..]));
    }

    #[test]
    fn last_value_of_repeated_key() {
        let unit = UnitFile::parse("[S]\nKey=a\nKey=b\n");
        assert_eq!(unit.last_value("S", "Key"), Some("b"));
        assert_eq!(unit.last_value("S", "Missing"), None);
    }
}
