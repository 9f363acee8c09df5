use flate2::read::GzDecoder;
use kartoteka::store::json_io;
use kartoteka::store::{FileBridge, FsBridge};
use kartoteka::KartotekaError;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn archived_paths(archive: &Path) -> Vec<String> {
    let file = fs::File::open(archive).unwrap();
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut paths: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    paths.sort();
    paths
}

#[test]
fn test_read_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    let err = bridge.read_text(&dir.path().join("nema.json")).unwrap_err();
    assert!(matches!(err, KartotekaError::NotFound(_)));
}

#[test]
fn test_json_round_trip_on_disk() {
    let dir = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    let path = dir.path().join("Postavke").join("clinic-info.json");
    let doc = json!({"name": "Ordinacija", "tags": ["a", "b"], "nested": {"x": null, "y": 1.5}});

    assert!(json_io::write_json(&bridge, &path, &doc));
    let back: Value = json_io::read_json(&bridge, &path).unwrap();
    assert_eq!(back, doc);

    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.starts_with("{\n  \""));
}

#[test]
fn test_read_json_or_default_for_missing_and_corrupt() {
    let dir = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    let path = dir.path().join("a.json");
    assert_eq!(json_io::read_json_or(&bridge, &path, json!([])), json!([]));

    fs::write(&path, "{ not json").unwrap();
    assert_eq!(json_io::read_json_or(&bridge, &path, json!([1])), json!([1]));
}

#[test]
fn test_list_directory_is_sorted() {
    let dir = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    for name in ["c.json", "a.json", "b"] {
        if name.ends_with(".json") {
            fs::write(dir.path().join(name), "{}").unwrap();
        } else {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
    }
    assert_eq!(
        bridge.list_directory(dir.path()).unwrap(),
        vec!["a.json", "b", "c.json"]
    );
}

#[test]
fn test_copy_directory_is_recursive() {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    fs::create_dir_all(src.path().join("Pacijenti/Ana_1")).unwrap();
    fs::write(src.path().join("Pacijenti/Ana_1/karton.json"), "{\"id\": 1}").unwrap();

    let target = dest.path().join("kopija");
    bridge.copy_directory(src.path(), &target).unwrap();
    assert_eq!(
        fs::read_to_string(target.join("Pacijenti/Ana_1/karton.json")).unwrap(),
        "{\"id\": 1}"
    );

    assert!(bridge
        .copy_directory(&src.path().join("nema"), &target)
        .is_err());
}

#[test]
fn test_create_archive_skips_excluded_entries() {
    let dir = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    let base = dir.path();
    fs::create_dir_all(base.join("Pacijenti")).unwrap();
    fs::create_dir_all(base.join("SigurnosneKopije")).unwrap();
    fs::write(base.join("Pacijenti/index.json"), "{\"patients\": []}").unwrap();
    fs::write(base.join("SigurnosneKopije/old.tar.gz"), "x").unwrap();

    let dest = base.join("SigurnosneKopije/backup_test.tar.gz");
    bridge
        .create_archive(base, &dest, &["SigurnosneKopije"])
        .unwrap();

    let paths = archived_paths(&dest);
    assert!(paths.iter().any(|p| p == "Pacijenti/index.json"));
    assert!(!paths.iter().any(|p| p.starts_with("SigurnosneKopije")));
}

#[test]
fn test_delete_file_and_tree() {
    let dir = TempDir::new().unwrap();
    let bridge = FsBridge::new();
    fs::create_dir_all(dir.path().join("x/y")).unwrap();
    fs::write(dir.path().join("x/y/z.json"), "1").unwrap();
    fs::write(dir.path().join("f.json"), "1").unwrap();

    assert!(bridge.delete(&dir.path().join("f.json")).unwrap());
    assert!(bridge.delete(&dir.path().join("x")).unwrap());
    assert!(!bridge.delete(&dir.path().join("x")).unwrap());
    assert!(!dir.path().join("x").exists());
}
