//! Zip package store, registry and config integration tests against real files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use promote_core::{
    config, BatchContext, ChangeKind, ChangedFile, PackageStore, ProjectName, RegistryError,
    ZipPackageStore,
};
use zip::write::SimpleFileOptions;

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    let file = fs::File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish zip");
}

const FOO_JSON: &str =
    r#"{"project": {"name": "NS-Foo", "keyName": "NS-123", "crossReferences": []}}"#;

// ---------------------------------------------------------------------------
// 1. Zip package store
// ---------------------------------------------------------------------------

#[test]
fn zip_store_reports_marker_and_root_descriptors() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    write_zip(
        &repo.path().join("Foo-Bar/Foo-Bar.deployment.zip"),
        &[
            ("multiExport.txt", "export"),
            ("Foo-Bar.json", FOO_JSON),
            ("attachments/readme.json", "{}"),
            ("notes.txt", "ignored"),
        ],
    );

    let store = ZipPackageStore::new(repo.path());
    let contents = store
        .open(Path::new("Foo-Bar/Foo-Bar.deployment.zip"))
        .expect("open");
    assert!(contents.has_manifest);
    assert_eq!(contents.descriptors.len(), 1);
    assert_eq!(contents.descriptors[0].file, "Foo-Bar.json");
}

#[test]
fn zip_store_rejects_non_archives() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    repo.child("Foo/Foo.deployment.zip")
        .write_str("not a zip")
        .expect("write");

    let store = ZipPackageStore::new(repo.path());
    let err = store.open(Path::new("Foo/Foo.deployment.zip")).unwrap_err();
    assert!(matches!(err, RegistryError::Archive { .. }), "got: {err}");
    assert!(err.to_string().contains("Foo.deployment.zip"));
}

#[test]
fn zip_store_missing_file_is_io_error() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    let store = ZipPackageStore::new(repo.path());
    let err = store.open(Path::new("nope.deployment.zip")).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
}

// ---------------------------------------------------------------------------
// 2. Registry from a change list
// ---------------------------------------------------------------------------

#[test]
fn registry_builds_batch_from_changes() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    write_zip(
        &repo.path().join("Foo-Bar/Foo-Bar.deployment.zip"),
        &[("multiExport.txt", ""), ("Foo-Bar.json", FOO_JSON)],
    );
    let changes = vec![
        ChangedFile {
            path: PathBuf::from("Foo-Bar/Foo-Bar.deployment.zip"),
            kind: ChangeKind::Added,
        },
        ChangedFile {
            path: PathBuf::from("Gone/Gone.deployment.zip"),
            kind: ChangeKind::Deleted,
        },
    ];

    let mut ctx = BatchContext::new(false);
    let n = ctx
        .register_changes(&changes, &ZipPackageStore::new(repo.path()))
        .expect("register");
    assert_eq!(n, 1);
    let d = ctx.project(&ProjectName::from("NS-Foo")).expect("descriptor");
    assert_eq!(d.descriptor_file, "Foo-Bar.json");
    assert_eq!(d.cross_references, Some(vec![]));
}

#[test]
fn registry_rejects_archive_without_marker() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    write_zip(
        &repo.path().join("Foo/Foo.deployment.zip"),
        &[("Foo.json", FOO_JSON)],
    );
    let mut ctx = BatchContext::new(true);
    let err = ctx
        .register(Path::new("Foo/Foo.deployment.zip"), &ZipPackageStore::new(repo.path()))
        .unwrap_err();
    assert!(matches!(err, RegistryError::MalformedPackage { .. }));
}

#[test]
fn registry_reports_broken_descriptor_with_file_name() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    write_zip(
        &repo.path().join("Foo/Foo.deployment.zip"),
        &[("multiExport.txt", ""), ("Foo.json", "{\"project\": 3}")],
    );
    let mut ctx = BatchContext::new(false);
    let err = ctx
        .register(Path::new("Foo/Foo.deployment.zip"), &ZipPackageStore::new(repo.path()))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Descriptor { .. }));
    assert!(err.to_string().contains("Foo.json"));
}

// ---------------------------------------------------------------------------
// 3. Config lookup
// ---------------------------------------------------------------------------

#[test]
fn repo_config_wins_over_user_config() {
    let repo = assert_fs::TempDir::new().expect("repo");
    let home = assert_fs::TempDir::new().expect("home");
    repo.child(".promote.yaml")
        .write_str("main_branch: trunk\n")
        .expect("repo config");
    home.child(".promote/config.yaml")
        .write_str("main_branch: release\n")
        .expect("user config");

    let cfg = config::load_at(repo.path(), home.path()).expect("load");
    assert_eq!(cfg.main_branch, "trunk");
}

#[test]
fn user_config_used_when_repo_has_none() {
    let repo = assert_fs::TempDir::new().expect("repo");
    let home = assert_fs::TempDir::new().expect("home");
    home.child(".promote/config.yaml")
        .write_str("servers:\n  Test: https://tracker-test.example.com\n")
        .expect("user config");
    home.child(".promote/config.yaml")
        .assert(predicate::path::exists());

    let cfg = config::load_at(repo.path(), home.path()).expect("load");
    assert_eq!(
        cfg.server_url("Test").expect("alias"),
        "https://tracker-test.example.com"
    );
}

#[test]
fn defaults_when_no_config_exists() {
    let repo = assert_fs::TempDir::new().expect("repo");
    let home = assert_fs::TempDir::new().expect("home");
    let cfg = config::load_at(repo.path(), home.path()).expect("load");
    assert_eq!(cfg, config::Config::default());
}

#[test]
fn corrupt_config_reports_path() {
    let repo = assert_fs::TempDir::new().expect("repo");
    repo.child(".promote.yaml")
        .write_str("servers: [unclosed")
        .expect("write");
    let err = config::load_from(&repo.path().join(".promote.yaml")).unwrap_err();
    assert!(matches!(err, RegistryError::ConfigParse { .. }));
    assert!(err.to_string().contains(".promote.yaml"));
}

#[test]
fn explicit_missing_config_is_not_found() {
    let repo = assert_fs::TempDir::new().expect("repo");
    let err = config::load_from(&repo.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, RegistryError::ConfigNotFound { .. }));
}
