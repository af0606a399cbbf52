use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{error, info};
use updist_archive::{ArchiveFormat, PackReport, ZipSource};
use updist_fs::Workspace;

use crate::{Change, Error, JanitorHandle, MANIFEST_NAME, PatchManifest, Result};

/// Copy fan-out per available CPU.
const WORKERS_PER_CPU: usize = 10;

/// Where a patch's payload bytes are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
    /// An unpacked version tree.
    Directory(PathBuf),
    /// A full zip package; entries are streamed without unpacking the archive.
    Zip(PathBuf),
    /// A full tar.gz package; unpacked into staging first since tar has no
    /// random access.
    TarGz(PathBuf),
}

impl PatchSource {
    /// Pick the variant from what is on disk at `path`.
    pub fn detect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        match updist_archive::detect_file(path) {
            Ok(ArchiveFormat::Zip) => Ok(Self::Zip(path.to_path_buf())),
            Ok(ArchiveFormat::TarGz) => Ok(Self::TarGz(path.to_path_buf())),
            Err(_) => Err(Error::UnsupportedSource(path.to_path_buf())),
        }
    }
}

/// A finished patch archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchArtifact {
    /// File name of the archive inside the output directory.
    pub name:     String,
    pub path:     PathBuf,
    pub hash:     String,
    pub manifest: PatchManifest,
    pub report:   PackReport,
}

/// Builds incremental patch archives from a change set.
///
/// Payload files are copied into a fresh staging root in parallel, the
/// manifest is written next to them, and the root is packed into
/// `{output_dir}/{patch_name}.{ext}`. The staging root is disposed of on every
/// path out of [`generate`](PatchBuilder::generate), through the janitor when
/// one is attached.
#[derive(Debug, Clone)]
pub struct PatchBuilder {
    output_dir:   PathBuf,
    staging_root: PathBuf,
    format:       ArchiveFormat,
    max_workers:  usize,
    janitor:      Option<JanitorHandle>,
}

impl PatchBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            output_dir:   output_dir.into(),
            staging_root: std::env::temp_dir(),
            format:       ArchiveFormat::Zip,
            max_workers:  cpus * WORKERS_PER_CPU,
            janitor:      None,
        }
    }

    pub fn staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
        self.staging_root = staging_root.into();
        self
    }

    pub fn format(mut self, format: ArchiveFormat) -> Self {
        self.format = format;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn janitor(mut self, janitor: JanitorHandle) -> Self {
        self.janitor = Some(janitor);
        self
    }

    pub fn output_dir(&self) -> &Path { &self.output_dir }

    pub fn archive_name(&self, patch_name: &str) -> String {
        format!("{patch_name}.{}", self.format.extension())
    }

    /// Build the patch. Blocks on file I/O; call from a blocking context.
    pub fn generate(
        &self,
        patch_name: &str,
        source: &PatchSource,
        changes: &[Change],
    ) -> Result<PatchArtifact> {
        let started = Instant::now();
        let manifest = PatchManifest::from_changes(changes)?;
        info!(
            patch = patch_name,
            payload = manifest.payload_len(),
            deleted = manifest.deleted.len(),
            "generating patch"
        );

        let staging = Workspace::create_in(&self.staging_root, "patch-").map_err(Error::Staging)?;
        let result = self.build(patch_name, source, &manifest, &staging);
        self.dispose(staging);

        let report = result?;
        info!(
            patch = patch_name,
            bytes = report.total_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "patch generated"
        );
        Ok(PatchArtifact {
            name: self.archive_name(patch_name),
            path: report.path.clone(),
            hash: report.hash.clone(),
            manifest,
            report,
        })
    }

    fn build(
        &self,
        patch_name: &str,
        source: &PatchSource,
        manifest: &PatchManifest,
        staging: &Workspace,
    ) -> Result<PackReport> {
        let payload_root = staging.create_dir_all("payload")?;
        let paths: Vec<&str> = manifest.payload_paths().collect();

        match source {
            PatchSource::Directory(root) => self.copy_all(&paths, &payload_root, || {
                let root = root.clone();
                Ok(move |path: &str, dest: &Path| -> Result<()> {
                    updist_fs::copy_file(updist_fs::join_relative(&root, path)?, dest)?;
                    Ok(())
                })
            })?,
            PatchSource::Zip(archive) => self.copy_all(&paths, &payload_root, || {
                let mut zip = ZipSource::open(archive)?;
                Ok(move |path: &str, dest: &Path| -> Result<()> {
                    zip.copy_entry(path, dest)?;
                    Ok(())
                })
            })?,
            PatchSource::TarGz(archive) => {
                let unpacked = staging.create_dir_all("source")?;
                updist_archive::extract(archive, &unpacked)?;
                self.copy_all(&paths, &payload_root, || {
                    let root = unpacked.clone();
                    Ok(move |path: &str, dest: &Path| -> Result<()> {
                        updist_fs::copy_file(updist_fs::join_relative(&root, path)?, dest)?;
                        Ok(())
                    })
                })?
            }
        }

        updist_fs::atomic_write(
            payload_root.join(MANIFEST_NAME),
            &manifest.to_json()?,
            updist_fs::AtomicWriteOptions::new(),
        )?;

        let dest = self.output_dir.join(self.archive_name(patch_name));
        Ok(updist_archive::pack_dir(&payload_root, dest, self.format)?)
    }

    /// Run `copy` for every path on a bounded set of scoped threads. Each
    /// worker builds its own copier through `make_copier` so archive handles
    /// are never shared. The first failure stops further scheduling; it is
    /// returned once in-flight copies have finished.
    fn copy_all<M, C>(&self, paths: &[&str], dest_root: &Path, make_copier: M) -> Result<()>
    where
        M: Fn() -> Result<C> + Sync,
        C: FnMut(&str, &Path) -> Result<()>,
    {
        if paths.is_empty() {
            return Ok(());
        }

        let workers = self.max_workers.min(paths.len());
        let next = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let first_error: Mutex<Option<Error>> = Mutex::new(None);

        let fail = |err: Error| {
            cancelled.store(true, Ordering::SeqCst);
            first_error.lock().get_or_insert(err);
        };

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    let mut copy = match make_copier() {
                        Ok(copy) => copy,
                        Err(e) => return fail(e),
                    };
                    while !cancelled.load(Ordering::SeqCst) {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(&path) = paths.get(index) else {
                            break;
                        };
                        let outcome = updist_fs::join_relative(dest_root, path)
                            .map_err(Error::from)
                            .and_then(|dest| copy(path, &dest));
                        if let Err(e) = outcome {
                            error!(path, error = %e, "patch copy failed");
                            fail(Error::Copy {
                                path:   path.to_string(),
                                source: Box::new(e),
                            });
                            break;
                        }
                    }
                });
            }
        });

        match first_error.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn dispose(&self, staging: Workspace) {
        match &self.janitor {
            Some(janitor) => janitor.dispose(staging.detach()),
            None => drop(staging),
        }
    }
}
