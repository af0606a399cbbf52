use std::io::Read;
use std::path::Path;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    /// Guess from a file name; used when naming outputs, never for reading.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] => Some(ArchiveFormat::Zip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::TarGz),
        _ => None,
    }
}

/// Sniff the magic bytes at the start of `path`.
pub fn detect_file(path: impl AsRef<Path>) -> Result<ArchiveFormat> {
    let path = path.as_ref();
    let read_err = |source| Error::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(read_err)?;
    let mut header = Vec::with_capacity(8);
    file.take(8).read_to_end(&mut header).map_err(read_err)?;
    detect_format(&header).ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_zip_format() {
        let zip_header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&zip_header), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_empty_zip_format() {
        let eocd = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00];
        assert_eq!(detect_format(&eocd), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_tar_gz_format() {
        let gz_header = [0x1F, 0x8B, 0x08, 0x00];
        assert_eq!(detect_format(&gz_header), Some(ArchiveFormat::TarGz));
    }

    #[test]
    fn detect_unknown() {
        assert_eq!(detect_format(b"plain text"), None);
        assert_eq!(detect_format(&[]), None);
    }

    #[test]
    fn file_name_guess() {
        assert_eq!(ArchiveFormat::from_file_name("a.ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_file_name("a.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("a.tar"), None);
    }
}
