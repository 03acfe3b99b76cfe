//! Translation between paths reported by Radarr/Sonarr and local paths.

use crate::config::PathMapping;
use std::path::{Path, PathBuf};

/// Rewrites external path prefixes to local ones, longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct PathTranslator {
    mappings: Vec<PathMapping>,
}

impl PathTranslator {
    pub fn new(mappings: &[PathMapping]) -> Self {
        let mut mappings = mappings.to_vec();
        mappings.sort_by(|a, b| b.container.len().cmp(&a.container.len()));
        Self { mappings }
    }

    /// Translate a path received from an external trigger.
    ///
    /// Prefixes only match on a path-component boundary, so `/tv` does not
    /// rewrite `/tvshows/...`. Unmapped paths are returned unchanged.
    pub fn translate(&self, path: &str) -> PathBuf {
        for mapping in &self.mappings {
            if let Some(rest) = strip_prefix(path, &mapping.container) {
                let host = mapping.host.trim_end_matches('/');
                return PathBuf::from(format!("{}{}", host, rest));
            }
        }
        PathBuf::from(path)
    }

    /// Host prefix of the mapping containing `path`, if any.
    pub fn host_root(&self, path: &Path) -> Option<PathBuf> {
        let path = path.to_string_lossy();
        self.mappings
            .iter()
            .filter(|m| strip_prefix(&path, &m.host).is_some())
            .max_by_key(|m| m.host.len())
            .map(|m| PathBuf::from(&m.host))
    }

    /// Where a job's temp directory goes: the override, else the mapped
    /// volume holding the file, else the system temp dir.
    pub fn volume_root(&self, path: &Path, temp_override: Option<&Path>) -> PathBuf {
        if let Some(dir) = temp_override {
            return dir.to_path_buf();
        }
        self.host_root(path).unwrap_or_else(std::env::temp_dir)
    }

    /// Every mapped host prefix, for orphan cleanup.
    pub fn host_roots(&self) -> Vec<PathBuf> {
        self.mappings.iter().map(|m| PathBuf::from(&m.host)).collect()
    }
}

fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}
