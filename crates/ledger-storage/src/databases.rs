//! Local database files kept by the client.

use crate::StorageResult;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory of local database files (offline caches and the like).
#[derive(Debug, Clone)]
pub struct LocalDatabases {
    dir: PathBuf,
}

impl LocalDatabases {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of the database files present, sorted.
    pub fn list(&self) -> StorageResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every database file.
    ///
    /// Returns the deleted names; a file that cannot be removed is logged and
    /// skipped so the rest are still deleted.
    pub fn delete_all(&self) -> StorageResult<(Vec<String>, Vec<String>)> {
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for name in self.list()? {
            match std::fs::remove_file(self.dir.join(&name)) {
                Ok(()) => deleted.push(name),
                Err(e) => {
                    warn!(database = %name, error = %e, "Failed to delete local database");
                    failed.push(name);
                }
            }
        }
        Ok((deleted, failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_dir_lists_nothing() {
        let dir = tempdir().unwrap();
        let databases = LocalDatabases::new(dir.path().join("absent"));
        assert!(databases.list().unwrap().is_empty());
        assert!(databases.delete_all().unwrap().0.is_empty());
    }

    #[test]
    fn test_delete_all_removes_files_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("projects.sqlite"), b"x").unwrap();
        std::fs::write(dir.path().join("cache.db"), b"y").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let databases = LocalDatabases::new(dir.path());
        assert_eq!(databases.list().unwrap(), vec!["cache.db", "projects.sqlite"]);

        let (deleted, failed) = databases.delete_all().unwrap();
        assert_eq!(deleted, vec!["cache.db", "projects.sqlite"]);
        assert!(failed.is_empty());
        assert!(databases.list().unwrap().is_empty());
        assert!(dir.path().join("nested").is_dir());
    }
}
