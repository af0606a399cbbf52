use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::debug;
use updist_fs::AtomicFile;
use zip::write::SimpleFileOptions;

use crate::{ArchiveFormat, Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackReport {
    pub path:        PathBuf,
    pub format:      ArchiveFormat,
    pub entry_count: usize,
    pub total_bytes: u64,
    /// Lowercase hex SHA-256 of the finished archive.
    pub hash:        String,
}

/// Pack every regular file under `src_dir` into `dest`.
///
/// The archive is written under a temporary sibling name and only renamed to
/// `dest` once compression finished, so `dest` never holds a partial archive.
pub fn pack_dir(
    src_dir: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    format: ArchiveFormat,
) -> Result<PackReport> {
    let src_dir = src_dir.as_ref();
    let dest = dest.as_ref();
    let files = updist_fs::walk_files(src_dir)?;

    let file = AtomicFile::create(dest)?;
    let (file, total_bytes) = match format {
        ArchiveFormat::Zip => write_zip(file, src_dir, &files)?,
        ArchiveFormat::TarGz => write_tar_gz(file, src_dir, &files)?,
    };
    file.commit()?;

    let hash = updist_verify::hash_file(dest)?;
    debug!(path = %dest.display(), entries = files.len(), total_bytes, "packed archive");
    Ok(PackReport {
        path: dest.to_path_buf(),
        format,
        entry_count: files.len(),
        total_bytes,
        hash,
    })
}

fn write_zip(file: AtomicFile, src_dir: &Path, files: &[String]) -> Result<(AtomicFile, u64)> {
    let staging = file.staging_path().to_path_buf();
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .large_file(true);
    let mut total = 0u64;

    for name in files {
        let path = updist_fs::join_relative(src_dir, name)?;
        let mut input = open(&path)?;
        writer.start_file(name.as_str(), options)?;
        total += std::io::copy(&mut input, &mut writer).map_err(|e| Error::Write {
            path: staging.clone(),
            source: e,
        })?;
    }

    let file = writer.finish()?;
    Ok((file, total))
}

fn write_tar_gz(file: AtomicFile, src_dir: &Path, files: &[String]) -> Result<(AtomicFile, u64)> {
    let staging = file.staging_path().to_path_buf();
    let write_err = |source| Error::Write {
        path: staging.clone(),
        source,
    };
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let mut total = 0u64;

    for name in files {
        let path = updist_fs::join_relative(src_dir, name)?;
        let mut input = open(&path)?;
        total += input
            .metadata()
            .map_err(|e| Error::Read {
                path: path.clone(),
                source: e,
            })?
            .len();
        builder.append_file(name, &mut input).map_err(write_err)?;
    }

    let mut file = builder
        .into_inner()
        .map_err(write_err)?
        .finish()
        .map_err(write_err)?;
    file.flush().map_err(write_err)?;
    Ok((file, total))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}
