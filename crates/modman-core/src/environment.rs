//! Runtime environment a module descriptor can be restricted to
//!
//! Descriptor lines may carry keyed tokens limiting them to a host version,
//! an operating system or a UI locale:
//! - `MAYAVERSION` (e.g. `MAYAVERSION:2024`)
//! - `PLATFORM` (`linux`, `win64`, `mac`)
//! - `LOCALE` (e.g. `LOCALE:en_US`)

use serde::{Deserialize, Serialize};

use crate::descriptor::ModuleRecord;

/// Recognized keyed attribute of a descriptor line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeKey {
    #[serde(rename = "MAYAVERSION")]
    MayaVersion,
    Platform,
    Locale,
}

impl AttributeKey {
    /// All recognized keys, in the order they are extracted from a line
    pub const ALL: [AttributeKey; 3] = [
        AttributeKey::MayaVersion,
        AttributeKey::Platform,
        AttributeKey::Locale,
    ];

    /// Token prefix as written in descriptor files
    pub fn name(&self) -> &'static str {
        match self {
            Self::MayaVersion => "MAYAVERSION",
            Self::Platform => "PLATFORM",
            Self::Locale => "LOCALE",
        }
    }

    /// Get key name for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::MayaVersion => "Maya Version",
            Self::Platform => "Platform",
            Self::Locale => "Locale",
        }
    }
}

impl std::fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Values of the current host for every [`AttributeKey`]
///
/// `None` means the value is unknown. A record restricted on a key whose
/// value is unknown is never considered compatible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub maya_version: Option<String>,
    pub platform: Option<String>,
    pub locale: Option<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for a key
    pub fn with(mut self, key: AttributeKey, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match key {
            AttributeKey::MayaVersion => self.maya_version = value,
            AttributeKey::Platform => self.platform = value,
            AttributeKey::Locale => self.locale = value,
        }
        self
    }

    pub fn value(&self, key: AttributeKey) -> Option<&str> {
        match key {
            AttributeKey::MayaVersion => self.maya_version.as_deref(),
            AttributeKey::Platform => self.platform.as_deref(),
            AttributeKey::Locale => self.locale.as_deref(),
        }
    }

    /// Platform identifier Maya reports for the operating system this binary targets
    pub fn current_platform() -> &'static str {
        if cfg!(target_os = "windows") {
            "win64"
        } else if cfg!(target_os = "macos") {
            "mac"
        } else {
            "linux"
        }
    }

    /// Check whether a record may be loaded in this environment
    ///
    /// Every attribute present on the record must equal the environment's
    /// value for that key. Keys absent from the record impose no constraint.
    pub fn is_compatible(&self, record: &ModuleRecord) -> bool {
        record
            .attributes
            .iter()
            .all(|(key, value)| self.value(*key) == Some(value.as_str()))
    }
}
