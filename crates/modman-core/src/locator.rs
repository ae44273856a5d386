//! Discovery of module descriptor files across the module search path

use std::ffi::OsStr;
use std::path::PathBuf;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::descriptor::normalize_path;

/// Extension of module descriptor files (matched case-insensitively)
pub const DEFAULT_EXTENSION: &str = "mod";

/// Files starting with this name belong to the manager itself
pub const DEFAULT_RESERVED_PREFIX: &str = "moduleManager";

/// Environment variable Maya reads its module search path from
pub const MODULE_PATH_VAR: &str = "MAYA_MODULE_PATH";

#[derive(Debug, Clone)]
pub struct Locator {
    search_paths: Vec<PathBuf>,
    extension: String,
    reserved_prefix: String,
}

impl Locator {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            extension: DEFAULT_EXTENSION.to_string(),
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefix = prefix.into();
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Split a path-list value such as `MAYA_MODULE_PATH`
    pub fn search_paths_from_env(value: &OsStr) -> Vec<PathBuf> {
        std::env::split_paths(value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect()
    }

    /// Find descriptor files in every search directory, sorted by file name
    ///
    /// Directories that do not exist or cannot be read are skipped; hosts
    /// commonly list stale entries on their module path.
    pub fn find_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for dir in &self.search_paths {
            if !dir.is_dir() {
                debug!(path = %dir.display(), "skipping missing module directory");
                continue;
            }

            for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "cannot read module directory");
                        continue;
                    }
                };
                if !entry.path().is_file() {
                    continue;
                }

                let name = entry.file_name().to_string_lossy();
                if self.is_descriptor_name(&name) {
                    files.push(normalize_path(entry.path()));
                }
            }
        }

        // Stable: equal names keep search path order
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!(count = files.len(), "found descriptor files");
        files
    }

    fn is_descriptor_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        let suffix = format!(".{}", self.extension.to_lowercase());
        let reserved = !self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix);
        lower.ends_with(&suffix) && !reserved
    }
}
