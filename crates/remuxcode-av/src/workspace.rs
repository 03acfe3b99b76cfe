//! Per-job working directories.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of every per-job working directory.
pub const TEMP_DIR_PREFIX: &str = ".remuxcode-temp-";

/// Leftovers from interrupted runs, removed by [`cleanup_orphans`].
const ORPHAN_PREFIXES: &[&str] = &[
    TEMP_DIR_PREFIX,
    ".dts-temp-",
    ".audio-temp-",
    ".cleanup-temp-",
];
const ORPHAN_MARKER: &str = ".hevc-tmp";

/// Where a finalized output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub path: PathBuf,
    /// The destination had vanished by the time the output was ready, so the
    /// output was placed there fresh instead of replacing anything.
    pub original_missing: bool,
}

/// A job-private temporary directory holding one transformation's output.
///
/// The directory lives on the same volume as the media when possible, so
/// finalizing is a rename rather than a copy. It is removed on drop, which
/// discards the output of a failed step.
///
/// # Example
///
/// ```no_run
/// use remuxcode_av::Workspace;
/// use std::path::Path;
///
/// let workspace = Workspace::new("/media/movie.mkv", Path::new("/media"), "3f2a9c1b7d4e")?;
/// // ... write the transformed file to workspace.output() ...
/// workspace.finalize(None)?;
/// # Ok::<(), remuxcode_av::Error>(())
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Create a workspace under `volume_root`, namespaced by `job_id`.
    pub fn new<P: AsRef<Path>>(input: P, volume_root: &Path, job_id: &str) -> Result<Self> {
        let input = input.as_ref();
        let file_name = input
            .file_name()
            .ok_or_else(|| Error::InvalidInput(format!("Invalid input file path: {:?}", input)))?;

        std::fs::create_dir_all(volume_root).map_err(|e| {
            Error::Workspace(format!("Failed to create {:?}: {}", volume_root, e))
        })?;

        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("{TEMP_DIR_PREFIX}{job_id}-"))
            .tempdir_in(volume_root)
            .map_err(|e| Error::Workspace(e.to_string()))?;

        let output_path = temp_dir.path().join(file_name);

        Ok(Self {
            temp_dir,
            input_path: input.to_path_buf(),
            output_path,
        })
    }

    /// Write the output under a different file name inside the workspace.
    pub fn with_output_name(mut self, name: &str) -> Self {
        self.output_path = self.temp_dir.path().join(name);
        self
    }

    /// Get the input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Get the output file path.
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Move the output over the original (or `destination`).
    ///
    /// The destination is checked again right before the move. If it still
    /// exists it is backed up, replaced, and the backup removed, restoring the
    /// backup on failure. If it has disappeared, its parent is recreated and
    /// the output is placed there.
    pub fn finalize(self, destination: Option<&Path>) -> Result<Finalized> {
        let dest = destination.unwrap_or(&self.input_path).to_path_buf();

        if !self.output_path.exists() {
            return Err(Error::Workspace(format!(
                "Output file does not exist: {:?}",
                self.output_path
            )));
        }

        if dest.exists() {
            let backup = backup_path(&dest);
            std::fs::rename(&dest, &backup).map_err(|e| {
                Error::Workspace(format!("Failed to create backup of original file: {}", e))
            })?;

            if let Err(e) = move_file(&self.output_path, &dest) {
                let _ = std::fs::rename(&backup, &dest);
                return Err(Error::Workspace(format!(
                    "Failed to move output to destination: {}",
                    e
                )));
            }

            let _ = std::fs::remove_file(&backup);
            return Ok(Finalized {
                path: dest,
                original_missing: false,
            });
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Workspace(format!("Failed to recreate {:?}: {}", parent, e))
            })?;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            "Original file disappeared during processing, placing output at {:?}",
            dest
        );

        move_file(&self.output_path, &dest).map_err(|e| {
            Error::Workspace(format!("Failed to move output to destination: {}", e))
        })?;

        Ok(Finalized {
            path: dest,
            original_missing: true,
        })
    }

    /// Clean up without finalizing (discard output).
    pub fn cleanup(self) {
        drop(self.temp_dir);
    }
}

fn backup_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".remuxcode-bak");
    dest.with_file_name(name)
}

/// Rename, falling back to copy and remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn is_orphan(name: &str) -> bool {
    ORPHAN_PREFIXES.iter().any(|p| name.starts_with(p)) || name.contains(ORPHAN_MARKER)
}

/// Remove leftover temp files and directories directly inside each of `roots`.
///
/// Returns how many entries were removed. Unreadable roots are skipped.
pub fn cleanup_orphans<P: AsRef<Path>>(roots: &[P]) -> usize {
    let mut removed = 0;
    for root in roots {
        let Ok(entries) = std::fs::read_dir(root.as_ref()) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !is_orphan(&name.to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    removed += 1;
                    #[cfg(feature = "tracing")]
                    tracing::info!("Removed orphaned temp entry {:?}", path);
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Failed to remove orphaned temp entry {:?}: {}", path, _e);
                }
            }
        }
    }
    removed
}
