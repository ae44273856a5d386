//! Module Manager
//!
//! Front door for presentation layers: discovers descriptor files, reads
//! their module records and toggles them, all against an explicit context
//! instead of process-wide state.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::descriptor::{DescriptorFile, ModuleIdentity, ModuleRecord};
use crate::environment::Environment;
use crate::error::Result;
use crate::locator::Locator;

/// Everything the manager needs to know about the host
#[derive(Debug, Clone)]
pub struct ManagerContext {
    pub locator: Locator,
    pub environment: Environment,
}

impl ManagerContext {
    pub fn new(search_paths: Vec<PathBuf>, environment: Environment) -> Self {
        Self {
            locator: Locator::new(search_paths),
            environment,
        }
    }

    /// Build a context from configuration, searching `search_paths`
    pub fn from_config(config: &Config, search_paths: Vec<PathBuf>) -> Self {
        Self {
            locator: Locator::new(search_paths)
                .with_extension(config.search.extension.clone())
                .with_reserved_prefix(config.search.reserved_prefix.clone()),
            environment: config.to_environment(),
        }
    }
}

/// A descriptor file together with the records read from it
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorSummary {
    pub path: PathBuf,
    pub writable: bool,
    pub records: Vec<ModuleEntry>,
    /// Set when the file could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A record with the values derived for its descriptor and environment
#[derive(Debug, Clone, Serialize)]
pub struct ModuleEntry {
    #[serde(flatten)]
    pub record: ModuleRecord,
    pub compatible: bool,
    pub content_path: PathBuf,
}

/// A record found by name, with the file it lives in
#[derive(Debug, Clone)]
pub struct ModuleMatch {
    pub file: PathBuf,
    pub entry: ModuleEntry,
}

pub struct ModuleManager {
    context: ManagerContext,
}

impl ModuleManager {
    pub fn new(context: ManagerContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ManagerContext {
        &self.context
    }

    pub fn environment(&self) -> &Environment {
        &self.context.environment
    }

    /// Descriptor files on the search path, sorted by file name
    pub fn list_descriptor_files(&self) -> Vec<PathBuf> {
        self.context.locator.find_files()
    }

    /// Module records of one descriptor file, in source order
    pub fn list_records(&self, path: &Path) -> Result<Vec<ModuleRecord>> {
        DescriptorFile::new(path).records()
    }

    pub fn is_compatible(&self, record: &ModuleRecord) -> bool {
        self.context.environment.is_compatible(record)
    }

    pub fn resolve_content_path(&self, record: &ModuleRecord, owning_file: &Path) -> PathBuf {
        record.resolve_content_path(owning_file)
    }

    /// Set the enabled state of the record with `identity` in `path`
    ///
    /// Returns the number of matching lines. Zero means the record changed
    /// or disappeared since it was read, and the file was left as is.
    pub fn set_enabled(
        &self,
        path: &Path,
        identity: &ModuleIdentity,
        enabled: bool,
    ) -> Result<usize> {
        DescriptorFile::new(path).set_enabled(identity, enabled)
    }

    /// Read every descriptor file
    ///
    /// A file that cannot be read is reported with its error instead of
    /// aborting the scan.
    pub fn scan(&self) -> Vec<DescriptorSummary> {
        self.list_descriptor_files()
            .into_iter()
            .map(|path| self.summarize(path))
            .collect()
    }

    /// Find records named `name` across all descriptor files
    pub fn find(&self, name: &str) -> Vec<ModuleMatch> {
        self.scan()
            .into_iter()
            .flat_map(|summary| {
                let file = summary.path;
                summary
                    .records
                    .into_iter()
                    .filter(|entry| entry.record.name == name)
                    .map(move |entry| ModuleMatch {
                        file: file.clone(),
                        entry,
                    })
            })
            .collect()
    }

    fn summarize(&self, path: PathBuf) -> DescriptorSummary {
        let file = DescriptorFile::new(&path);
        let writable = file.is_writable();

        match file.records() {
            Ok(records) => DescriptorSummary {
                records: records
                    .into_iter()
                    .map(|record| self.entry(record, &path))
                    .collect(),
                path,
                writable,
                error: None,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read descriptor");
                DescriptorSummary {
                    path,
                    writable,
                    records: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn entry(&self, record: ModuleRecord, owning_file: &Path) -> ModuleEntry {
        ModuleEntry {
            compatible: self.is_compatible(&record),
            content_path: self.resolve_content_path(&record, owning_file),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::AttributeKey;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (ModuleManager, TempDir) {
        let temp = TempDir::new().unwrap();
        let modules = temp.path().join("modules");
        fs::create_dir(&modules).unwrap();
        fs::write(
            modules.join("tool.mod"),
            "-Tool 1.0 ../content MAYAVERSION=2024\nscripts: scripts\n",
        )
        .unwrap();
        fs::write(
            modules.join("render.mod"),
            "+ MAYAVERSION:2025 Render 3.0 /opt/render\n+ Render 3.0 /opt/render-any\n",
        )
        .unwrap();

        let environment = Environment::new().with(AttributeKey::MayaVersion, "2024");
        let context = ManagerContext::new(
            vec![temp.path().join("missing"), modules],
            environment,
        );
        (ModuleManager::new(context), temp)
    }

    #[test]
    fn end_to_end_toggle() {
        let (manager, temp) = setup();
        let files = manager.list_descriptor_files();
        assert_eq!(files.len(), 2);
        let tool_file = files[1].clone();
        assert!(tool_file.ends_with("tool.mod"));

        let records = manager.list_records(&tool_file).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(!record.enabled);
        assert_eq!(record.attribute(AttributeKey::MayaVersion), Some("2024"));
        assert!(manager.is_compatible(record));
        assert_eq!(
            manager.resolve_content_path(record, &tool_file),
            temp.path().join("content")
        );

        let matched = manager
            .set_enabled(&tool_file, &record.identity(), true)
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(
            fs::read_to_string(&tool_file).unwrap(),
            "+Tool 1.0 ../content MAYAVERSION=2024\nscripts: scripts\n"
        );
    }

    #[test]
    fn scan_marks_compatibility() {
        let (manager, _temp) = setup();
        let summaries = manager.scan();
        assert_eq!(summaries.len(), 2);

        let render = &summaries[0];
        assert!(render.path.ends_with("render.mod"));
        assert!(render.error.is_none());
        assert_eq!(render.records.len(), 2);
        assert!(!render.records[0].compatible);
        assert!(render.records[1].compatible);
    }

    #[test]
    fn find_by_name() {
        let (manager, _temp) = setup();
        let matches = manager.find("Render");
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.file.ends_with("render.mod")));
        assert!(manager.find("Nothing").is_empty());
    }

    #[test]
    fn stale_record_is_a_no_op() {
        let (manager, _temp) = setup();
        let file = manager.list_descriptor_files()[0].clone();
        let before = fs::read_to_string(&file).unwrap();

        let stale = ModuleIdentity {
            name: "Render".to_string(),
            version: "2.0".to_string(),
            path: "/opt/render".to_string(),
            attributes: Default::default(),
        };
        assert_eq!(manager.set_enabled(&file, &stale, false).unwrap(), 0);
        assert_eq!(fs::read_to_string(&file).unwrap(), before);
    }

    #[test]
    fn entry_serializes_flat() {
        let (manager, _temp) = setup();
        let summaries = manager.scan();
        let json = serde_json::to_value(&summaries[1].records[0]).unwrap();
        assert_eq!(json["name"], "Tool");
        assert_eq!(json["enabled"], false);
        assert_eq!(json["compatible"], true);
        assert_eq!(json["attributes"]["MAYAVERSION"], "2024");
    }
}
