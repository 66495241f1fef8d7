//! Cached list of locally available maps

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::net::messages::SessionConfig;

/// File extension of map archives
pub const MAP_EXTENSION: &str = "wz";

#[derive(Debug, Clone)]
pub struct LevelCache {
    dir: PathBuf,
    files: BTreeSet<String>,
}

impl LevelCache {
    /// Scan `dir` for maps. A missing directory is an empty cache.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut cache = Self {
            dir: dir.into(),
            files: BTreeSet::new(),
        };
        if let Err(e) = cache.rebuild() {
            tracing::warn!(error = %e, dir = %cache.dir.display(), "Failed to scan maps directory");
        }
        cache
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Forget the cached list and rescan the directory
    pub fn rebuild(&mut self) -> io::Result<usize> {
        self.files.clear();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let path = entry?.path();
            let is_map = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(MAP_EXTENSION));
            if let (true, Some(name)) = (is_map, path.file_name().and_then(|n| n.to_str())) {
                self.files.insert(name.to_string());
            }
        }

        tracing::debug!(count = self.files.len(), "Level list rebuilt");
        Ok(self.files.len())
    }

    pub fn contains_file(&self, file_name: &str) -> bool {
        self.files.contains(file_name)
    }

    /// The map named by `config` is available locally
    pub fn has_map(&self, config: &SessionConfig) -> bool {
        self.contains_file(&config.map_file_name())
    }

    /// Path a map would be served from
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }
}
