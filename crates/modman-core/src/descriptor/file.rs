use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::record::{marker_for, parse_line, ModuleIdentity, ModuleRecord};
use crate::error::{ModManError, Result};

/// A module descriptor file on disk
///
/// Nothing is cached: every call reads the file again, so edits made by
/// other programs in between are always picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    path: PathBuf,
}

/// Outcome of rewriting the lines of a descriptor in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: Vec<u8>,
    pub matched: usize,
    pub changed: usize,
}

impl DescriptorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all lines as raw bytes with their terminators stripped
    ///
    /// Lines are not required to be UTF-8; those that are not can never be
    /// module lines and are carried through rewrites byte for byte.
    pub fn read_lines(&self) -> Result<Vec<Vec<u8>>> {
        let content = fs::read(&self.path).map_err(|e| ModManError::file_access(&self.path, e))?;
        Ok(split_lines(&content))
    }

    /// Module records in source order, other lines omitted
    pub fn records(&self) -> Result<Vec<ModuleRecord>> {
        let records: Vec<ModuleRecord> = self
            .read_lines()?
            .iter()
            .filter_map(|line| parse_bytes(line))
            .collect();
        debug!(path = %self.path.display(), count = records.len(), "parsed descriptor");
        Ok(records)
    }

    /// Whether the current user may rewrite this file
    pub fn is_writable(&self) -> bool {
        OpenOptions::new().append(true).open(&self.path).is_ok()
    }

    /// Set the enabled state of every line matching `identity`
    ///
    /// Only the marker character of matching lines changes. All other lines
    /// are written back as read, each terminated by a single `\n`. The file
    /// is rewritten even when nothing matched. Returns the number of lines
    /// that matched.
    pub fn set_enabled(&self, identity: &ModuleIdentity, enabled: bool) -> Result<usize> {
        let lines = self.read_lines()?;
        let rewrite = rewrite_lines(&lines, identity, enabled);

        self.write(&rewrite.content)?;

        info!(
            path = %self.path.display(),
            module = %identity.name,
            enabled,
            matched = rewrite.matched,
            changed = rewrite.changed,
            "updated descriptor"
        );
        Ok(rewrite.matched)
    }

    /// Replace the content of the file, following symlinks to the real file
    ///
    /// The new content goes to a temporary file next to the target which is
    /// then renamed over it. When the directory does not allow creating files
    /// the target is truncated and written in place instead.
    fn write(&self, content: &[u8]) -> Result<()> {
        let access = |e| ModManError::file_access(&self.path, e);

        let target = fs::canonicalize(&self.path).map_err(access)?;
        let permissions = fs::metadata(&target).map_err(access)?.permissions();

        // A read-only descriptor must fail instead of being replaced by the rename
        OpenOptions::new()
            .append(true)
            .open(&target)
            .map_err(access)?;

        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = match NamedTempFile::new_in(dir) {
            Ok(tmp) => tmp,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %target.display(), "directory not writable, writing in place");
                return write_in_place(&target, content).map_err(access);
            }
            Err(e) => return Err(access(e)),
        };
        tmp.write_all(content).map_err(access)?;
        tmp.as_file().sync_all().map_err(access)?;
        fs::set_permissions(tmp.path(), permissions).map_err(access)?;
        tmp.persist(&target).map_err(|e| access(e.error))?;
        Ok(())
    }
}

fn write_in_place(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

/// Split on `\n`, dropping a `\r` before it and the empty tail after a final `\n`
fn split_lines(content: &[u8]) -> Vec<Vec<u8>> {
    if content.is_empty() {
        return Vec::new();
    }
    let content = content.strip_suffix(b"\n").unwrap_or(content);
    content
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
        .collect()
}

fn parse_bytes(line: &[u8]) -> Option<ModuleRecord> {
    std::str::from_utf8(line).ok().and_then(parse_line)
}

/// Rewrite lines in memory, flipping the marker of lines matching `identity`
pub fn rewrite_lines<S: AsRef<[u8]>>(
    lines: &[S],
    identity: &ModuleIdentity,
    enabled: bool,
) -> Rewrite {
    let marker = marker_for(enabled) as u8;
    let mut content = Vec::new();
    let mut matched = 0;
    let mut changed = 0;

    for line in lines {
        let line = line.as_ref();
        match parse_bytes(line) {
            Some(record) if identity.matches(&record) => {
                matched += 1;
                if record.enabled != enabled {
                    changed += 1;
                }
                // Markers are single byte ASCII
                content.push(marker);
                content.extend_from_slice(&line[1..]);
            }
            _ => content.extend_from_slice(line),
        }
        content.push(b'\n');
    }

    Rewrite {
        content,
        matched,
        changed,
    }
}
