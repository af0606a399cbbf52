use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;
use updist_verify::FileHashes;

use crate::{ArchiveFormat, Error, Result, detect_file};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractReport {
    pub format:      ArchiveFormat,
    pub entry_count: usize,
    pub total_bytes: u64,
}

/// Hash the regular-file entries of an archive without unpacking it.
/// Keys are the sanitized `/`-separated entry names.
pub fn hash_entries(archive: impl AsRef<Path>) -> Result<FileHashes> {
    let archive = archive.as_ref();
    let mut hashes = FileHashes::new();
    match detect_file(archive)? {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(open(archive)?)?;
            for index in 0..zip.len() {
                let mut entry = zip.by_index(index)?;
                if entry.is_dir() {
                    continue;
                }
                let name = sanitized_name(entry.name(), entry.enclosed_name())?;
                let digest = updist_verify::hash_reader(&mut entry).map_err(|e| read_err(archive, e))?;
                hashes.insert(name, digest);
            }
        }
        ArchiveFormat::TarGz => {
            let mut tar = tar::Archive::new(GzDecoder::new(open(archive)?));
            for entry in tar.entries().map_err(|e| read_err(archive, e))? {
                let mut entry = entry.map_err(|e| read_err(archive, e))?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let raw = entry.path().map_err(|e| read_err(archive, e))?.into_owned();
                let name = tar_name(&raw)?;
                let digest = updist_verify::hash_reader(&mut entry).map_err(|e| read_err(archive, e))?;
                hashes.insert(name, digest);
            }
        }
    }
    Ok(hashes)
}

/// Unpack `archive` below `dest`. Entries that would land outside `dest`
/// abort the extraction.
pub fn extract(archive: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<ExtractReport> {
    let archive = archive.as_ref();
    let dest = dest.as_ref();
    let format = detect_file(archive)?;
    let mut entry_count = 0usize;
    let mut total_bytes = 0u64;

    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(open(archive)?)?;
            for index in 0..zip.len() {
                let mut entry = zip.by_index(index)?;
                if entry.is_dir() {
                    continue;
                }
                let name = sanitized_name(entry.name(), entry.enclosed_name())?;
                let target = updist_fs::join_relative(dest, &name)?;
                total_bytes += updist_fs::copy_reader(&mut entry, &target)?;
                entry_count += 1;
            }
        }
        ArchiveFormat::TarGz => {
            let mut tar = tar::Archive::new(GzDecoder::new(open(archive)?));
            for entry in tar.entries().map_err(|e| read_err(archive, e))? {
                let mut entry = entry.map_err(|e| read_err(archive, e))?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let raw = entry.path().map_err(|e| read_err(archive, e))?.into_owned();
                let name = tar_name(&raw)?;
                let target = updist_fs::join_relative(dest, &name)?;
                total_bytes += updist_fs::copy_reader(&mut entry, &target)?;
                entry_count += 1;
            }
        }
    }

    debug!(archive = %archive.display(), entry_count, total_bytes, "extracted archive");
    Ok(ExtractReport {
        format,
        entry_count,
        total_bytes,
    })
}

pub(crate) fn sanitized_name(raw: &str, enclosed: Option<PathBuf>) -> Result<String> {
    let enclosed = enclosed.ok_or_else(|| Error::ZipSlip {
        entry: PathBuf::from(raw),
    })?;
    tar_name(&enclosed)
}

fn tar_name(raw: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in raw.components() {
        match component {
            std::path::Component::Normal(part) => parts.push(part.to_string_lossy()),
            std::path::Component::CurDir => {}
            _ => {
                return Err(Error::ZipSlip {
                    entry: raw.to_path_buf(),
                });
            }
        }
    }
    if parts.is_empty() {
        return Err(Error::ZipSlip {
            entry: raw.to_path_buf(),
        });
    }
    Ok(parts.join("/"))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| read_err(path, e))
}

fn read_err(path: &Path, source: std::io::Error) -> Error {
    Error::Read {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tar_name_normalises() {
        assert_eq!(tar_name(Path::new("./bin/app")).unwrap(), "bin/app");
        assert!(matches!(
            tar_name(Path::new("../evil")),
            Err(Error::ZipSlip { .. })
        ));
        assert!(matches!(tar_name(Path::new("/etc/passwd")), Err(Error::ZipSlip { .. })));
        assert!(tar_name(Path::new(".")).is_err());
    }

    #[test]
    fn zip_name_without_enclosure_is_rejected() {
        assert!(matches!(
            sanitized_name("../x", None),
            Err(Error::ZipSlip { .. })
        ));
    }
}
