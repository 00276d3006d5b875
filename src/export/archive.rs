//! Compressed archives of a staging directory
//!
//! The tar stream is written straight through a gzip encoder, so the
//! uncompressed tar never exists on disk. The archive is assembled under a
//! hidden name in the staging root, outside every per-index directory, and
//! only moved into the destination once complete.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::error::{ExportError, FilesystemError, Result};

use super::sanitize::sanitize_file_name;
use super::staging::{StagingArea, move_file, partial_path};

/// Archive file name, `<indexId>-<unixTimestamp>.tar.gz`
pub fn archive_file_name(index_id: &str, timestamp: i64) -> String {
    format!("{}-{}.tar.gz", sanitize_file_name(index_id), timestamp)
}

/// Bundle the staged documents into an archive and publish it
///
/// The staged XML files archived here are removed once the archive is in
/// place. Nothing else in the directory is touched.
///
/// # Returns
/// * `Result<PathBuf>` - Final archive path inside the destination directory
pub async fn archive_and_publish(area: &StagingArea, timestamp: i64) -> Result<PathBuf> {
    let name = archive_file_name(area.index_id(), timestamp);
    let building = partial_path(&area.staging_root().join(&name));
    let files = area.staged_files().await?;

    debug!(
        "Archiving {} files from {} into {}",
        files.len(),
        area.staging_dir().display(),
        building.display()
    );

    let target = building.clone();
    let sources = files.clone();
    let built = tokio::task::spawn_blocking(move || build_tar_gz(&target, &sources))
        .await
        .map_err(|e| ExportError::Generic(format!("Archive task failed: {e}")))?;
    if let Err(source) = built {
        let _ = tokio::fs::remove_file(&building).await;
        return Err(FilesystemError::Archive {
            path: building,
            source,
        }
        .into());
    }

    let published = area.destination_dir().join(&name);
    move_file(&building, &published).await?;
    area.remove_files(&files).await?;

    info!(
        "Compressed all documents and stored as {}",
        published.display()
    );
    Ok(published)
}

/// Write `files` (by base name) into a gzip-compressed tar at `target`
pub fn build_tar_gz(target: &Path, files: &[PathBuf]) -> io::Result<()> {
    let file = File::create(target)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for path in files {
        let Some(name) = path.file_name() else {
            continue;
        };
        builder.append_path_with_name(path, name)?;
    }

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    Ok(())
}
