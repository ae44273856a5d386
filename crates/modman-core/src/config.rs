use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::{AttributeKey, Environment};
use crate::error::{ModManError, Result};
use crate::locator::{DEFAULT_EXTENSION, DEFAULT_RESERVED_PREFIX};

const CONFIG_FILE: &str = "config.toml";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# modman configuration file
# Location: ~/.modman/config.toml

[search]
# Module directories searched when MAYA_MODULE_PATH is not set
# Example: paths = ["/studio/maya/modules", "~/maya/modules"]
paths = []

# Extension of module descriptor files (matched case-insensitively)
extension = "mod"

# Descriptor files starting with this name are never listed
reserved_prefix = "moduleManager"

[environment]
# Values module lines are checked against (MAYAVERSION, PLATFORM, LOCALE).
# A module restricted on a value that is not set here is shown as incompatible.
# maya_version = "2024"
# platform = "linux"      # defaults to the platform modman runs on
# locale = "en_US"
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,
}

/// Descriptor discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Module search directories
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Descriptor file extension
    #[serde(default = "default_extension")]
    pub extension: String,

    /// File name prefix excluded from discovery
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
}

/// Host environment values used for compatibility checks
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maya_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_reserved_prefix() -> String {
    DEFAULT_RESERVED_PREFIX.to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            extension: default_extension(),
            reserved_prefix: default_reserved_prefix(),
        }
    }
}

const KEYS: &[&str] = &[
    "search.paths",
    "search.extension",
    "search.reserved_prefix",
    "environment.maya_version",
    "environment.platform",
    "environment.locale",
];

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| ModManError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| ModManError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "search.paths" => format!("{:?}", self.search.paths),
            "search.extension" => self.search.extension.clone(),
            "search.reserved_prefix" => self.search.reserved_prefix.clone(),
            "environment.maya_version" => display_optional(&self.environment.maya_version),
            "environment.platform" => display_optional(&self.environment.platform),
            "environment.locale" => display_optional(&self.environment.locale),
            _ => return None,
        };
        Some(value)
    }

    /// Set a config value by dot-notation key
    ///
    /// An empty value clears the optional environment keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "search.paths" => {
                self.search.paths = parse_string_list(value)?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect();
            }
            "search.extension" => {
                let extension = value.trim().trim_start_matches('.');
                if extension.is_empty() || extension.contains(['/', '\\']) {
                    return Err(ModManError::InvalidConfigValue {
                        key: key.to_string(),
                        message: format!("'{}' is not a file extension", value),
                    });
                }
                self.search.extension = extension.to_string();
            }
            "search.reserved_prefix" => {
                self.search.reserved_prefix = value.trim().to_string();
            }
            "environment.maya_version" => self.environment.maya_version = parse_optional(value),
            "environment.platform" => self.environment.platform = parse_optional(value),
            "environment.locale" => self.environment.locale = parse_optional(value),
            _ => {
                return Err(ModManError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Convert to the environment module lines are checked against
    ///
    /// The platform falls back to the one this binary runs on.
    pub fn to_environment(&self) -> Environment {
        let mut environment = Environment::new().with(
            AttributeKey::Platform,
            self.environment
                .platform
                .clone()
                .unwrap_or_else(|| Environment::current_platform().to_string()),
        );
        if let Some(version) = &self.environment.maya_version {
            environment = environment.with(AttributeKey::MayaVersion, version.clone());
        }
        if let Some(locale) = &self.environment.locale {
            environment = environment.with(AttributeKey::Locale, locale.clone());
        }
        environment
    }
}

fn display_optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(unset)".to_string())
}

fn parse_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a comma-separated or JSON-like list string
fn parse_string_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();

    // Try JSON array format first: ["a", "b"]
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<String> = inner
            .split(',')
            .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return Ok(items);
    }

    // Comma-separated format: a,b,c or "a","b"
    let items: Vec<String> = trimmed
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_list_comma() {
        let result = parse_string_list("/studio/modules,/home/me/modules").unwrap();
        assert_eq!(result, vec!["/studio/modules", "/home/me/modules"]);
    }

    #[test]
    fn test_parse_string_list_json() {
        let result = parse_string_list(r#"["/studio/modules", "/opt/modules"]"#).unwrap();
        assert_eq!(result, vec!["/studio/modules", "/opt/modules"]);
    }

    #[test]
    fn test_parse_string_list_empty() {
        let result = parse_string_list("[]").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.search.paths.is_empty());
        assert_eq!(config.search.extension, "mod");
        assert_eq!(config.search.reserved_prefix, "moduleManager");
        assert_eq!(config.environment, EnvironmentConfig::default());
    }

    #[test]
    fn test_config_get_set() {
        let mut config = Config::default();

        config.set("search.paths", "/a,/b").unwrap();
        assert_eq!(
            config.search.paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );

        config.set("environment.maya_version", "2024").unwrap();
        assert_eq!(config.get("environment.maya_version").unwrap(), "2024");

        config.set("environment.maya_version", "").unwrap();
        assert_eq!(config.environment.maya_version, None);
        assert_eq!(config.get("environment.maya_version").unwrap(), "(unset)");

        config.set("search.extension", ".MOD").unwrap();
        assert_eq!(config.search.extension, "MOD");
    }

    #[test]
    fn test_unknown_key() {
        let mut config = Config::default();
        assert!(config.get("search.depth").is_none());
        assert!(matches!(
            config.set("search.depth", "3"),
            Err(ModManError::ConfigKeyNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_extension() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("search.extension", " "),
            Err(ModManError::InvalidConfigValue { .. })
        ));
        assert_eq!(config.search.extension, "mod");
    }

    #[test]
    fn test_list_covers_every_key() {
        let keys: Vec<String> = Config::default().list().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, KEYS);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.set("search.paths", "/studio/modules").unwrap();
        config.set("environment.locale", "ja_JP").unwrap();
        config.save(temp.path()).unwrap();

        let loaded = Config::load(temp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_init_template_parses_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Config::init(temp.path()).unwrap();
        assert!(path.exists());

        let loaded = Config::load(temp.path()).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_missing_is_default() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Config::load(temp.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_load_invalid() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[search\npaths = 1").unwrap();
        assert!(matches!(
            Config::load(temp.path()),
            Err(ModManError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_to_environment() {
        let mut config = Config::default();
        let environment = config.to_environment();
        assert_eq!(
            environment.value(AttributeKey::Platform),
            Some(Environment::current_platform())
        );
        assert_eq!(environment.value(AttributeKey::MayaVersion), None);

        config.set("environment.maya_version", "2025").unwrap();
        config.set("environment.platform", "mac").unwrap();
        let environment = config.to_environment();
        assert_eq!(environment.value(AttributeKey::MayaVersion), Some("2025"));
        assert_eq!(environment.value(AttributeKey::Platform), Some("mac"));
    }
}
