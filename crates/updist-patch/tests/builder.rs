use std::path::Path;

use updist_archive::{ArchiveFormat, ZipSource, hash_entries, pack_dir};
use updist_patch::{
    ChangeKind, Error, Janitor, MANIFEST_NAME, PatchBuilder, PatchManifest, PatchSource,
    calculate_diff,
};
use updist_verify::hash_tree;

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

struct Versions {
    _temp:   tempfile::TempDir,
    old:     std::path::PathBuf,
    new:     std::path::PathBuf,
    out:     std::path::PathBuf,
    staging: std::path::PathBuf,
}

fn versions() -> Versions {
    let temp = tempfile::Builder::new()
        .prefix("updist-test-patch-")
        .tempdir()
        .unwrap();
    let old = temp.path().join("old");
    let new = temp.path().join("new");
    write(&old, "bin/app", b"app v1");
    write(&old, "lib/shared.so", b"shared");
    write(&old, "legacy.txt", b"remove me");
    write(&new, "bin/app", b"app v2");
    write(&new, "lib/shared.so", b"shared");
    write(&new, "assets/new.png", b"png");

    let out = temp.path().join("out");
    let staging = temp.path().join("staging");
    std::fs::create_dir_all(&staging).unwrap();
    Versions {
        old,
        new,
        out,
        staging,
        _temp: temp,
    }
}

fn staging_is_empty(staging: &Path) -> bool { std::fs::read_dir(staging).unwrap().count() == 0 }

#[test]
fn directory_patch_contains_only_payload_and_manifest() {
    let v = versions();
    let changes = calculate_diff(&hash_tree(&v.new).unwrap(), &hash_tree(&v.old).unwrap());
    let builder = PatchBuilder::new(&v.out).staging_root(&v.staging).max_workers(2);

    let artifact = builder
        .generate("app-1-2", &PatchSource::Directory(v.new.clone()), &changes)
        .unwrap();

    assert_eq!(artifact.name, "app-1-2.zip");
    assert_eq!(artifact.path, v.out.join("app-1-2.zip"));
    assert_eq!(artifact.hash, updist_verify::hash_file(&artifact.path).unwrap());
    assert_eq!(artifact.manifest.added, vec!["assets/new.png"]);
    assert_eq!(artifact.manifest.modified, vec!["bin/app"]);
    assert_eq!(artifact.manifest.deleted, vec!["legacy.txt"]);

    let entries = hash_entries(&artifact.path).unwrap();
    let mut names: Vec<&str> = entries.keys().map(String::as_str).collect();
    names.sort();
    assert_eq!(names, vec![MANIFEST_NAME, "assets/new.png", "bin/app"]);
    assert!(!entries.contains_key("lib/shared.so"));
    assert!(!entries.contains_key("legacy.txt"));

    let unpacked = v.out.join("check");
    updist_archive::extract(&artifact.path, &unpacked).unwrap();
    let manifest =
        PatchManifest::from_json(&std::fs::read(unpacked.join(MANIFEST_NAME)).unwrap()).unwrap();
    assert_eq!(manifest, artifact.manifest);
    assert_eq!(std::fs::read(unpacked.join("bin/app")).unwrap(), b"app v2");

    assert!(staging_is_empty(&v.staging));
}

#[test]
fn zip_source_streams_entries() {
    let v = versions();
    let full = v.out.join("full.zip");
    pack_dir(&v.new, &full, ArchiveFormat::Zip).unwrap();

    let changes = calculate_diff(&hash_entries(&full).unwrap(), &hash_tree(&v.old).unwrap());
    let source = PatchSource::detect(&full).unwrap();
    assert_eq!(source, PatchSource::Zip(full.clone()));

    let builder = PatchBuilder::new(&v.out)
        .staging_root(&v.staging)
        .format(ArchiveFormat::TarGz);
    let artifact = builder.generate("zip-src", &source, &changes).unwrap();

    assert!(artifact.name.ends_with(".tar.gz"));
    let entries = hash_entries(&artifact.path).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(staging_is_empty(&v.staging));
}

/// Writes entry names verbatim, unlike `pack_dir`.
fn write_raw_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn zip_source_with_dot_prefixed_entries() {
    let v = versions();
    let full = v.out.join("dotted.zip");
    std::fs::create_dir_all(&v.out).unwrap();
    write_raw_zip(&full, &[
        ("./bin/app", &b"app v2"[..]),
        ("./lib/shared.so", &b"shared"[..]),
        ("./assets/new.png", &b"png"[..]),
    ]);

    let hashes = hash_entries(&full).unwrap();
    assert!(hashes.contains_key("bin/app"));

    let changes = calculate_diff(&hashes, &hash_tree(&v.old).unwrap());
    let builder = PatchBuilder::new(&v.out).staging_root(&v.staging);
    let artifact = builder
        .generate("dotted", &PatchSource::Zip(full.clone()), &changes)
        .unwrap();

    assert_eq!(artifact.manifest.added, vec!["assets/new.png"]);
    assert_eq!(artifact.manifest.modified, vec!["bin/app"]);
    let mut zip = ZipSource::open(&artifact.path).unwrap();
    let copy = v.out.join("dotted-app");
    zip.copy_entry("bin/app", &copy).unwrap();
    assert_eq!(std::fs::read(copy).unwrap(), b"app v2");
    assert!(staging_is_empty(&v.staging));
}

#[test]
fn tar_gz_source_is_unpacked_first() {
    let v = versions();
    let full = v.out.join("full.tar.gz");
    pack_dir(&v.new, &full, ArchiveFormat::TarGz).unwrap();

    let changes = calculate_diff(&hash_entries(&full).unwrap(), &hash_tree(&v.old).unwrap());
    let builder = PatchBuilder::new(&v.out).staging_root(&v.staging);
    let artifact = builder
        .generate("tgz-src", &PatchSource::detect(&full).unwrap(), &changes)
        .unwrap();

    let mut zip = ZipSource::open(&artifact.path).unwrap();
    let copy = v.out.join("copied-app");
    zip.copy_entry("bin/app", &copy).unwrap();
    assert_eq!(std::fs::read(copy).unwrap(), b"app v2");
    assert!(staging_is_empty(&v.staging));
}

#[test]
fn missing_source_file_fails_without_partial_archive() {
    let v = versions();
    let mut changes = calculate_diff(&hash_tree(&v.new).unwrap(), &hash_tree(&v.old).unwrap());
    changes.push(updist_patch::Change::new("ghost/missing.bin", ChangeKind::Added));

    let builder = PatchBuilder::new(&v.out).staging_root(&v.staging).max_workers(4);
    let err = builder
        .generate("broken", &PatchSource::Directory(v.new.clone()), &changes)
        .unwrap_err();

    assert!(matches!(err, Error::Copy { ref path, .. } if path == "ghost/missing.bin"));
    assert!(!v.out.join("broken.zip").exists());
    assert!(staging_is_empty(&v.staging));
}

#[test]
fn deletions_only_patch_has_just_the_manifest() {
    let v = versions();
    let changes = vec![updist_patch::Change::new("legacy.txt", ChangeKind::Deleted)];
    let builder = PatchBuilder::new(&v.out).staging_root(&v.staging);
    let artifact = builder
        .generate("delete-only", &PatchSource::Directory(v.new.clone()), &changes)
        .unwrap();

    let entries = hash_entries(&artifact.path).unwrap();
    assert_eq!(entries.keys().collect::<Vec<_>>(), vec![MANIFEST_NAME]);
}

#[test]
fn unsupported_source_is_rejected() {
    let v = versions();
    let file = v.new.join("bin/app");
    assert!(matches!(
        PatchSource::detect(&file),
        Err(Error::UnsupportedSource(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn janitor_removes_staging_in_background() {
    let v = versions();
    let janitor = Janitor::spawn();
    let changes = calculate_diff(&hash_tree(&v.new).unwrap(), &hash_tree(&v.old).unwrap());
    let builder = PatchBuilder::new(&v.out)
        .staging_root(&v.staging)
        .janitor(janitor.handle());

    let source = PatchSource::Directory(v.new.clone());
    let artifact = tokio::task::spawn_blocking(move || builder.generate("bg", &source, &changes))
        .await
        .unwrap()
        .unwrap();
    assert!(artifact.path.exists());

    assert_eq!(janitor.shutdown().await, 1);
    assert!(staging_is_empty(&v.staging));
}
