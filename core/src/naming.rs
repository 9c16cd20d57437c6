//! Unit kinds and service-file naming
//!
//! A fixture's extension selects its unit kind; the kind determines the
//! generated service file's name: the fixture stem plus a per-kind suffix,
//! overridable by a `ServiceName=` key in the kind's own section.

use std::ffi::OsStr;
use std::path::Path;

use crate::UnitFile;

/// The unit kinds the generator under test accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// `.build` files
    Build,
    /// `.container` files
    Container,
    /// `.image` files
    Image,
    /// `.kube` files
    Kube,
    /// `.network` files
    Network,
    /// `.pod` files
    Pod,
    /// `.volume` files
    Volume,
}

impl UnitKind {
    /// All kinds, for extension-based discovery.
    pub const ALL: [UnitKind; 7] = [
        UnitKind::Build,
        UnitKind::Container,
        UnitKind::Image,
        UnitKind::Kube,
        UnitKind::Network,
        UnitKind::Pod,
        UnitKind::Volume,
    ];

    /// The file extension (without dot) for this kind.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            UnitKind::Build => "build",
            UnitKind::Container => "container",
            UnitKind::Image => "image",
            UnitKind::Kube => "kube",
            UnitKind::Network => "network",
            UnitKind::Pod => "pod",
            UnitKind::Volume => "volume",
        }
    }

    /// Determine the kind from a fixture path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(OsStr::to_str)?;
        Self::ALL.into_iter().find(|kind| kind.extension() == ext)
    }

    /// Suffix appended to the fixture stem in the default service name.
    const fn service_suffix(self) -> &'static str {
        match self {
            UnitKind::Build => "-build",
            UnitKind::Image => "-image",
            UnitKind::Network => "-network",
            UnitKind::Pod => "-pod",
            UnitKind::Volume => "-volume",
            UnitKind::Container | UnitKind::Kube => "",
        }
    }

    /// Section whose `ServiceName=` key overrides the default name.
    ///
    /// Kube units have no override.
    const fn name_section(self) -> Option<&'static str> {
        match self {
            UnitKind::Build => Some("Build"),
            UnitKind::Container => Some("Container"),
            UnitKind::Image => Some("Image"),
            UnitKind::Network => Some("Network"),
            UnitKind::Pod => Some("Pod"),
            UnitKind::Volume => Some("Volume"),
            UnitKind::Kube => None,
        }
    }
}

/// Derive the generated service file's name for a fixture.
///
/// `text` is the raw fixture contents; the `ServiceName=` override is read
/// from it as written, without canonicalization. The last recorded value
/// wins.
#[must_use]
pub fn service_file_name(path: &Path, text: &str) -> String {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or_default();

    let base = match UnitKind::from_path(path) {
        Some(kind) => {
            let unit = UnitFile::parse(text);
            match kind
                .name_section()
                .and_then(|section| unit.last_value(section, "ServiceName"))
            {
                Some(name) => name.to_string(),
                None => format!("{stem}{}", kind.service_suffix()),
            }
        }
        None => stem.to_string(),
    };
    format!("{base}.service")
}

/// The generic template file a template-instance fixture derives from.
///
/// `name@instance.container` maps to `name@.container`; anything else,
/// including the generic template itself, maps to `None`.
#[must_use]
pub fn template_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem().and_then(OsStr::to_str)?;
    let ext = path.extension().and_then(OsStr::to_str)?;
    let parts: Vec<&str> = stem.splitn(3, '@').collect();
    if parts.len() == 2 && !parts[1].is_empty() {
        Some(format!("{}@.{ext}", parts[0]))
    } else {
        None
    }
}
