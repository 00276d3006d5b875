//! Staging directories and publishing
//!
//! Documents are first written into `<staging_root>/<index>/`, then either
//! moved one by one into `<destination_root>/<index>/` or bundled into an
//! archive (see `archive`). When no staging root is configured the staging
//! and destination directories are the same and plain publishing is a no-op.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, FilesystemError, Result};

use super::sanitize::{document_file_name, sanitize_file_name};

/// Destination and staging roots for a run
#[derive(Debug, Clone)]
pub struct StagingLayout {
    destination_root: PathBuf,
    staging_root: PathBuf,
    create_missing: bool,
}

impl StagingLayout {
    /// Create a layout; the staging root defaults to the destination
    pub fn new(destination_root: impl Into<PathBuf>, staging_root: Option<PathBuf>) -> Self {
        let destination_root = destination_root.into();
        let staging_root = staging_root.unwrap_or_else(|| destination_root.clone());
        Self {
            destination_root,
            staging_root,
            create_missing: true,
        }
    }

    /// Whether missing roots are created (otherwise a missing destination is a
    /// configuration error)
    pub fn with_create_missing(mut self, create_missing: bool) -> Self {
        self.create_missing = create_missing;
        self
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Make sure both roots exist and are directories
    pub async fn prepare_roots(&self) -> Result<()> {
        self.ensure_root(&self.destination_root).await?;
        if self.staging_root != self.destination_root {
            self.ensure_root(&self.staging_root).await?;
        }
        Ok(())
    }

    async fn ensure_root(&self, path: &Path) -> Result<()> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::InvalidDestination(path.to_path_buf()).into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !self.create_missing {
                    return Err(ConfigError::InvalidDestination(path.to_path_buf()).into());
                }
                fs::create_dir_all(path)
                    .await
                    .map_err(|source| FilesystemError::CreateDir {
                        path: path.to_path_buf(),
                        source,
                    })?;
                info!("Created the {} directory", path.display());
                Ok(())
            }
            Err(source) => Err(FilesystemError::CreateDir {
                path: path.to_path_buf(),
                source,
            }
            .into()),
        }
    }

    /// Open the staging area for one index
    ///
    /// Creates the per-index staging and destination directories and clears
    /// leftovers of an earlier interrupted run from the staging directory.
    pub async fn open(&self, index_id: &str) -> Result<StagingArea> {
        let dir_name = sanitize_file_name(index_id);
        let area = StagingArea {
            index_id: index_id.to_string(),
            staging_root: self.staging_root.clone(),
            staging_dir: self.staging_root.join(&dir_name),
            destination_dir: self.destination_root.join(&dir_name),
            written: 0,
        };

        create_private_dir(&area.destination_dir).await?;
        if !area.in_place() {
            create_private_dir(&area.staging_dir).await?;
        }

        area.clear().await?;
        Ok(area)
    }
}

/// Create a directory readable only by the current user, if missing
async fn create_private_dir(path: &Path) -> Result<()> {
    if fs::metadata(path).await.is_ok() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(path)
        .await
        .map_err(|source| FilesystemError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Created the {} directory", path.display());
    Ok(())
}

/// Staging directory owned by the export of one index
#[derive(Debug)]
pub struct StagingArea {
    index_id: String,
    staging_root: PathBuf,
    staging_dir: PathBuf,
    destination_dir: PathBuf,
    written: u64,
}

impl StagingArea {
    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    /// Staging and destination are the same directory
    pub fn in_place(&self) -> bool {
        self.staging_dir == self.destination_dir
    }

    /// Number of document files written
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Check the staging directory is the one this area was opened for
    async fn verify_owned(&self) -> Result<()> {
        let expected_name = sanitize_file_name(&self.index_id);
        let owned = self.staging_dir.parent() == Some(self.staging_root.as_path())
            && self.staging_dir.file_name() == Some(OsStr::new(&expected_name));
        if !owned {
            return Err(FilesystemError::NotOwned(self.staging_dir.clone()).into());
        }

        let meta = fs::symlink_metadata(&self.staging_dir)
            .await
            .map_err(FilesystemError::Io)?;
        if !meta.is_dir() {
            return Err(FilesystemError::NotOwned(self.staging_dir.clone()).into());
        }
        Ok(())
    }

    /// Remove files left in the staging directory
    ///
    /// Only regular files and symlinks directly inside the directory are
    /// removed. Subdirectories are left in place.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of files removed
    pub async fn clear(&self) -> Result<usize> {
        self.verify_owned().await?;
        info!("Clearing the {} directory", self.staging_dir.display());

        let mut removed = 0;
        for path in list_entries(&self.staging_dir).await? {
            let meta = fs::symlink_metadata(&path)
                .await
                .map_err(FilesystemError::Io)?;
            if meta.is_dir() {
                warn!("Leaving subdirectory {} in place", path.display());
                continue;
            }
            fs::remove_file(&path)
                .await
                .map_err(|source| FilesystemError::Remove {
                    path: path.clone(),
                    source,
                })?;
            removed += 1;
        }

        debug!("Removed {} stale files", removed);
        Ok(removed)
    }

    /// Write one encoded document as `<sanitized id>.xml`
    pub async fn write_document(&mut self, id: &str, xml: &str) -> Result<PathBuf> {
        let path = self.staging_dir.join(document_file_name(id));
        write_file(&path, xml.as_bytes()).await?;
        self.written += 1;
        Ok(path)
    }

    /// Move every staged file into the destination directory
    ///
    /// Files become visible one at a time.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of files now in the destination
    pub async fn publish(&self) -> Result<usize> {
        let files = self.staged_files().await?;
        if self.in_place() {
            return Ok(files.len());
        }

        for from in &files {
            let Some(name) = from.file_name() else {
                continue;
            };
            move_file(from, &self.destination_dir.join(name)).await?;
        }
        debug!(
            "Moved {} files to {}",
            files.len(),
            self.destination_dir.display()
        );
        Ok(files.len())
    }

    /// Staged `.xml` document files, sorted by name
    pub async fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for path in list_entries(&self.staging_dir).await? {
            if path.extension() != Some(OsStr::new("xml")) {
                continue;
            }
            let meta = fs::symlink_metadata(&path)
                .await
                .map_err(FilesystemError::Io)?;
            if meta.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete `files`, typically the staged documents that were archived
    pub async fn remove_files(&self, files: &[PathBuf]) -> Result<usize> {
        for path in files {
            fs::remove_file(path)
                .await
                .map_err(|source| FilesystemError::Remove {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(files.len())
    }
}

async fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(FilesystemError::Io)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(FilesystemError::Io)? {
        paths.push(entry.path());
    }
    Ok(paths)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let to_err = |source| FilesystemError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(path).await.map_err(to_err)?;
    file.write_all(bytes).await.map_err(to_err)?;
    file.flush().await.map_err(to_err)?;
    Ok(())
}

/// Rename, falling back to copy and remove across filesystems
pub(crate) async fn move_file(from: &Path, to: &Path) -> Result<()> {
    let rename_err = match fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!(
        "Rename {} -> {} failed ({}), copying instead",
        from.display(),
        to.display(),
        rename_err
    );

    let to_err = |source| FilesystemError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    copy_into_place(from, to).await.map_err(to_err)?;
    fs::remove_file(from).await.map_err(to_err)?;
    Ok(())
}

/// Copy `from` next to `to` under a hidden name, then rename it to `to`
///
/// `to` only appears once its content is complete.
async fn copy_into_place(from: &Path, to: &Path) -> io::Result<()> {
    let partial = partial_path(to);
    let copied = match fs::copy(from, &partial).await {
        Ok(_) => fs::rename(&partial, to).await,
        Err(e) => Err(e),
    };
    if copied.is_err() {
        let _ = fs::remove_file(&partial).await;
    }
    copied
}

/// `<dir>/.<name>.part` for `<dir>/<name>`
pub(crate) fn partial_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    to.with_file_name(format!(".{name}.part"))
}
