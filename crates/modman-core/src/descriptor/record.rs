//! Parsing of a single descriptor line
//!
//! A module line looks like:
//!
//! ```text
//! + MAYAVERSION:2024 PLATFORM:linux MyModule 1.0 ../MyModule
//! ```
//!
//! The first character is the enabled marker (`+` or `-`). Keyed tokens may
//! appear anywhere on the line; once they are removed exactly four positional
//! tokens must remain: the marker, the module name, its version and its path.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::environment::AttributeKey;

pub const ENABLED_MARKER: char = '+';
pub const DISABLED_MARKER: char = '-';

/// Positional fields: marker, name, version, path
const POSITIONAL_FIELDS: usize = 4;

/// One parsed module line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    pub enabled: bool,
    pub name: String,
    pub version: String,
    pub path: String,
    pub attributes: BTreeMap<AttributeKey, String>,
}

/// Everything that identifies a module line except its enabled state
///
/// Used to find the source line of a record again when rewriting, so the
/// lookup succeeds whichever state the line is currently in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleIdentity {
    pub name: String,
    pub version: String,
    pub path: String,
    pub attributes: BTreeMap<AttributeKey, String>,
}

impl ModuleRecord {
    pub fn identity(&self) -> ModuleIdentity {
        ModuleIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
            path: self.path.clone(),
            attributes: self.attributes.clone(),
        }
    }

    pub fn attribute(&self, key: AttributeKey) -> Option<&str> {
        self.attributes.get(&key).map(String::as_str)
    }

    /// Absolute location of the module content
    ///
    /// Relative paths are resolved against the directory holding the
    /// descriptor file, not the working directory. The result is normalized
    /// lexically; the filesystem is not consulted.
    pub fn resolve_content_path(&self, descriptor_file: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let dir = descriptor_file.parent().unwrap_or_else(|| Path::new(""));
            let joined = dir.join(path);
            if joined.is_absolute() {
                joined
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(&joined))
                    .unwrap_or(joined)
            }
        };
        normalize_path(&joined)
    }
}

impl ModuleIdentity {
    pub fn matches(&self, record: &ModuleRecord) -> bool {
        self.name == record.name
            && self.version == record.version
            && self.path == record.path
            && self.attributes == record.attributes
    }
}

pub fn marker_for(enabled: bool) -> char {
    if enabled {
        ENABLED_MARKER
    } else {
        DISABLED_MARKER
    }
}

/// Parse a descriptor line (without its line terminator)
///
/// Returns `None` for anything that is not a well formed module line:
/// comments, continuation lines and lines that do not reduce to exactly four
/// positional fields are left alone by every operation.
pub fn parse_line(line: &str) -> Option<ModuleRecord> {
    let marker = line.chars().next()?;
    if marker != ENABLED_MARKER && marker != DISABLED_MARKER {
        return None;
    }

    let mut tokens: Vec<&str> = line.split_whitespace().collect();

    // `-Tool 1.0 path` carries the marker glued to the name
    if tokens[0].len() > marker.len_utf8() {
        let rest = &tokens[0][marker.len_utf8()..];
        tokens[0] = &line[..marker.len_utf8()];
        tokens.insert(1, rest);
    }

    let mut attributes = BTreeMap::new();
    for key in AttributeKey::ALL {
        let found = tokens
            .iter()
            .enumerate()
            .rev()
            .find(|(_, token)| token.starts_with(key.name()))
            .map(|(index, _)| index);

        if let Some(index) = found {
            let token = tokens.remove(index);
            attributes.insert(key, attribute_value(token, key));
        }
    }

    if tokens.len() != POSITIONAL_FIELDS {
        return None;
    }

    Some(ModuleRecord {
        enabled: marker == ENABLED_MARKER,
        name: tokens[1].to_string(),
        version: tokens[2].to_string(),
        path: tokens[3].to_string(),
        attributes,
    })
}

/// Value of a keyed token: everything after the key and one separator character
fn attribute_value(token: &str, key: AttributeKey) -> String {
    let mut rest = token[key.name().len()..].chars();
    rest.next();
    rest.as_str().to_string()
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if at_root {
                    if !normalized.has_root() {
                        normalized.push("..");
                    }
                } else if normalized.ends_with("..") {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            Component::Normal(name) => normalized.push(name),
        }
    }
    normalized
}
