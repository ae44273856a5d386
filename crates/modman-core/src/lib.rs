pub mod config;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod locator;
pub mod manager;

pub use config::Config;
pub use descriptor::{parse_line, DescriptorFile, ModuleIdentity, ModuleRecord};
pub use environment::{AttributeKey, Environment};
pub use error::{ModManError, Result};
pub use locator::{Locator, MODULE_PATH_VAR};
pub use manager::{DescriptorSummary, ManagerContext, ModuleEntry, ModuleManager, ModuleMatch};
