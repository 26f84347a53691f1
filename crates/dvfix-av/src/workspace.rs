//! Scratch space for a repair run.
//!
//! A [`Workspace`] is the directory that holds every intermediate file of one
//! run. Each intermediate is handed out as an [`Artifact`], a path guard that
//! deletes its file when dropped. Only the final container escapes cleanup,
//! via [`Artifact::keep`].

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary file owned by the pipeline.
///
/// The file (if it exists) is removed when the guard is dropped, on success
/// and failure paths alike.
///
/// # Example
///
/// ```
/// use dvfix_av::Artifact;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("original.hevc");
/// std::fs::write(&path, b"bitstream")?;
///
/// drop(Artifact::new(&path));
/// assert!(!path.exists());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    armed: bool,
}

impl Artifact {
    /// Take cleanup ownership of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the file from cleanup and return its path.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Removed {:?}", self.path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to remove {:?}: {}", self.path, _e);
            }
        }
    }
}

enum ScratchDir {
    Owned(TempDir),
    Borrowed(PathBuf),
}

impl ScratchDir {
    fn path(&self) -> &Path {
        match self {
            ScratchDir::Owned(dir) => dir.path(),
            ScratchDir::Borrowed(path) => path,
        }
    }
}

/// Workspace for one repair run.
///
/// Either owns a fresh temporary directory (removed with the workspace) or
/// borrows a directory supplied by the caller (left in place). A directory
/// must not be shared by two concurrent runs: artifact names are fixed.
///
/// # Example
///
/// ```no_run
/// use dvfix_av::Workspace;
/// use std::path::Path;
///
/// let workspace = Workspace::new(Path::new("/media/movie.mkv"))?;
/// let rpu = workspace.artifact("original.rpu");
/// // ... run tools that write rpu.path() ...
/// # Ok::<(), dvfix_av::Error>(())
/// ```
pub struct Workspace {
    dir: ScratchDir,
    input_path: PathBuf,
}

impl Workspace {
    /// Create a workspace backed by a new temporary directory.
    pub fn new(input: &Path) -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("dvfix-")
            .tempdir()
            .map_err(|e| Error::Workspace(format!("failed to create temp dir: {e}")))?;

        Ok(Self {
            dir: ScratchDir::Owned(temp_dir),
            input_path: input.to_path_buf(),
        })
    }

    /// Create a workspace inside an existing (or to-be-created) directory
    /// that outlives the workspace.
    pub fn in_dir(input: &Path, dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Workspace(format!("failed to create {}: {e}", dir.display()))
        })?;

        Ok(Self {
            dir: ScratchDir::Borrowed(dir.to_path_buf()),
            input_path: input.to_path_buf(),
        })
    }

    /// The file being repaired.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Path to the scratch directory.
    pub fn temp_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a named file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A cleanup-owned path for a named file inside the workspace.
    pub fn artifact(&self, name: &str) -> Artifact {
        Artifact::new(self.temp_file(name))
    }

    /// Move `produced` to `destination`.
    ///
    /// If `backup_ext` is given and `destination` already exists, it is
    /// renamed to `<destination>.<ext>` first; otherwise it is overwritten.
    /// Returns the final path.
    ///
    /// # Errors
    ///
    /// Returns an error if `produced` does not exist or a rename/copy fails.
    pub fn finalize(
        self,
        produced: &Path,
        destination: &Path,
        backup_ext: Option<&str>,
    ) -> Result<PathBuf> {
        if !produced.exists() {
            return Err(Error::Workspace(format!(
                "output file does not exist: {}",
                produced.display()
            )));
        }

        if let Some(ext) = backup_ext {
            if destination.exists() {
                let backup = destination.with_extension(ext);
                std::fs::rename(destination, &backup).map_err(|e| {
                    Error::Workspace(format!("failed to create backup: {e}"))
                })?;
            }
        }

        // Rename first (same filesystem), fall back to copy + remove.
        if std::fs::rename(produced, destination).is_err() {
            std::fs::copy(produced, destination).map_err(|e| {
                Error::Workspace(format!("failed to copy output to destination: {e}"))
            })?;
            let _ = std::fs::remove_file(produced);
        }

        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_artifact_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converted_video.hevc");
        fs::write(&path, b"hevc").unwrap();
        {
            let artifact = Artifact::new(&path);
            assert_eq!(artifact.path(), path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_artifact_never_written_drops_quietly() {
        let dir = tempfile::tempdir().unwrap();
        drop(Artifact::new(dir.path().join("never-created.rpu")));
    }

    #[test]
    fn test_kept_artifact_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converted.mkv");
        fs::write(&path, b"mkv").unwrap();
        let kept = Artifact::new(&path).keep();
        assert_eq!(kept, path);
        assert!(path.exists());
    }

    #[test]
    fn test_owned_workspace_paths() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let workspace = Workspace::new(input.path()).unwrap();
        assert_eq!(workspace.input(), input.path());
        let fixed = workspace.temp_file("fixed.hevc");
        assert_eq!(fixed.parent(), Some(workspace.temp_dir()));
        assert_eq!(workspace.artifact("fixed.hevc").path(), fixed);
    }

    #[test]
    fn test_owned_workspace_removes_directory() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let workspace = Workspace::new(input.path()).unwrap();
        let dir = workspace.temp_dir().to_path_buf();
        assert!(dir.exists());
        drop(workspace);
        assert!(!dir.exists());
    }

    #[test]
    fn test_borrowed_workspace_keeps_directory() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("flow-temp");
        let workspace = Workspace::in_dir(Path::new("/media/movie.mkv"), &scratch).unwrap();
        assert_eq!(workspace.temp_dir(), scratch);
        drop(workspace);
        assert!(scratch.exists());
    }

    fn encoded_with_result(dir: &Path) -> (Workspace, PathBuf, PathBuf) {
        let encoded = dir.join("encoded.mkv");
        fs::write(&encoded, b"lost rpu").unwrap();
        let workspace = Workspace::new(&encoded).unwrap();
        let converted = workspace.temp_file("converted.mkv");
        fs::write(&converted, b"fixed rpu").unwrap();
        (workspace, encoded, converted)
    }

    #[test]
    fn test_finalize_replaces_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let (workspace, encoded, converted) = encoded_with_result(dir.path());

        let placed = workspace.finalize(&converted, &encoded, Some("orig")).unwrap();

        assert_eq!(placed, encoded);
        assert_eq!(fs::read(&encoded).unwrap(), b"fixed rpu");
        assert_eq!(fs::read(dir.path().join("encoded.orig")).unwrap(), b"lost rpu");
        assert!(!converted.exists());
    }

    #[test]
    fn test_finalize_without_backup_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let (workspace, encoded, converted) = encoded_with_result(dir.path());

        workspace.finalize(&converted, &encoded, None).unwrap();

        assert_eq!(fs::read(&encoded).unwrap(), b"fixed rpu");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_finalize_to_separate_destination() {
        let dir = tempfile::tempdir().unwrap();
        let (workspace, encoded, converted) = encoded_with_result(dir.path());
        let repaired = dir.path().join("repaired.mkv");

        workspace.finalize(&converted, &repaired, Some("orig")).unwrap();

        assert_eq!(fs::read(&repaired).unwrap(), b"fixed rpu");
        assert_eq!(fs::read(&encoded).unwrap(), b"lost rpu");
        assert!(!dir.path().join("repaired.orig").exists());
    }

    #[test]
    fn test_finalize_requires_produced_file() {
        let dir = tempfile::tempdir().unwrap();
        let (workspace, encoded, converted) = encoded_with_result(dir.path());
        fs::remove_file(&converted).unwrap();

        let err = workspace.finalize(&converted, &encoded, None).unwrap_err();
        assert!(matches!(err, Error::Workspace(_)), "{err}");
        assert_eq!(fs::read(&encoded).unwrap(), b"lost rpu");
    }
}
