use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list storage directory '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed reading directory entry in '{}': {source}", .path.display())]
    Entry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identifier of one monitoring source, stored as 8 hex digits on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub u64);

impl SourceId {
    /// Parse the leading 8 hex digits of a directory entry name.
    pub fn from_entry_name(name: &str) -> Option<Self> {
        let digits = name.get(..8)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(SourceId)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// List the sources present in a storage directory.
///
/// Entries are matched on their leading 8 hex digits; dotfiles and anything
/// else are ignored. The result is sorted and free of duplicates. Any failure
/// to open or walk the directory is returned as an error.
pub fn enumerate_sources(dir: &Path) -> Result<Vec<SourceId>, DiscoveryError> {
    let entries = fs::read_dir(dir).map_err(|source| DiscoveryError::Open {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut sources = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Entry {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if let Some(id) = SourceId::from_entry_name(name) {
            sources.insert(id);
        }
    }

    Ok(sources.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_name_parsing() {
        assert_eq!(SourceId::from_entry_name("0000beef"), Some(SourceId(0xbeef)));
        assert_eq!(SourceId::from_entry_name("DEADBEEF"), Some(SourceId(0xdeadbeef)));
        assert_eq!(SourceId::from_entry_name("0000beef.old"), Some(SourceId(0xbeef)));
        assert_eq!(SourceId::from_entry_name("beef"), None);
        assert_eq!(SourceId::from_entry_name("0000beeg"), None);
        assert_eq!(SourceId::from_entry_name("README.md"), None);
    }

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(SourceId(0x2a).to_string(), "0000002a");
    }

    #[test]
    fn test_enumerate_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["0000000c", "0000000a", "0000000b", "notes", ".0000000d"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("0000000a.lock"), b"").unwrap();

        let sources = enumerate_sources(dir.path()).unwrap();
        assert_eq!(sources, vec![SourceId(0xa), SourceId(0xb), SourceId(0xc)]);
    }

    #[test]
    fn test_enumerate_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(enumerate_sources(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_enumerate_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let err = enumerate_sources(&missing).unwrap_err();
        assert!(matches!(err, DiscoveryError::Open { .. }));
        assert!(err.to_string().contains("gone"));
    }
}
