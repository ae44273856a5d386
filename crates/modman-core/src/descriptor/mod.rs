//! Module descriptor files
//!
//! Parsing happens line by line; any line that is not a well formed module
//! line is carried through rewrites untouched.

mod file;
mod record;

pub use file::{rewrite_lines, DescriptorFile, Rewrite};
pub use record::{
    marker_for, normalize_path, parse_line, ModuleIdentity, ModuleRecord, DISABLED_MARKER,
    ENABLED_MARKER,
};
