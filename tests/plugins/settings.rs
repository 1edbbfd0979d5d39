use playdeck::core::error::DeckError;
use playdeck::plugins::settings::{ConfigDocument, ConfigStore, InventoryFile, explicit_inventory};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const DEFAULT_DIR: &str = "/etc/ansible/playbooks";

#[test]
fn test_missing_document_reads_default_without_creating_it() {
    let tmp = tempdir().unwrap();
    let settings = ConfigStore::new(tmp.path().join("data/config.json"), DEFAULT_DIR);

    let doc = settings.load();
    assert_eq!(doc.playbooks_dir(), Some(DEFAULT_DIR));
    assert_eq!(settings.playbooks_dir(), Path::new(DEFAULT_DIR));
    assert!(!settings.path().exists());
}

#[test]
fn test_update_playbooks_dir_persists_and_keeps_unknown_keys() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    fs::write(&path, r#"{"playbooks_dir": "/old", "theme": {"accent": "teal"}}"#).unwrap();
    let settings = ConfigStore::new(&path, DEFAULT_DIR);

    settings.update_playbooks_dir("  /srv/playbooks  ").unwrap();

    let doc = settings.load();
    assert_eq!(doc.playbooks_dir(), Some("/srv/playbooks"));
    assert_eq!(doc.get("theme").unwrap()["accent"], "teal");

    let raw: ConfigDocument = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw, doc);
}

#[test]
fn test_blank_playbooks_dir_is_rejected() {
    let tmp = tempdir().unwrap();
    let settings = ConfigStore::new(tmp.path().join("config.json"), DEFAULT_DIR);

    let err = settings.update_playbooks_dir("   ").unwrap_err();
    assert!(matches!(err, DeckError::ValidationError(ref m) if m == "Directory path cannot be empty"));
    assert!(!settings.path().exists());
}

#[test]
fn test_corrupt_document_falls_back_to_default() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    fs::write(&path, "not json at all").unwrap();
    let settings = ConfigStore::new(&path, DEFAULT_DIR);

    assert_eq!(settings.playbooks_dir(), Path::new(DEFAULT_DIR));

    // A document without the key still yields a directory.
    fs::write(&path, r#"{"other": 1}"#).unwrap();
    assert_eq!(settings.load().playbooks_dir(), Some(DEFAULT_DIR));
}

#[test]
fn test_hosts_file_override_and_fallback() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    let settings = ConfigStore::new(&path, DEFAULT_DIR);
    let fallback = Path::new("/etc/ansible/hosts");

    assert_eq!(settings.hosts_file(fallback), fallback);
    fs::write(&path, r#"{"playbooks_dir": "/pb", "hosts_file": "/srv/inventory"}"#).unwrap();
    assert_eq!(settings.hosts_file(fallback), Path::new("/srv/inventory"));
}

#[test]
fn test_ensure_initialized_writes_default_once() {
    let tmp = tempdir().unwrap();
    let settings = ConfigStore::new(tmp.path().join("data/config.json"), DEFAULT_DIR);

    assert!(settings.ensure_initialized().unwrap());
    settings.update_playbooks_dir("/srv/pb").unwrap();
    assert!(!settings.ensure_initialized().unwrap());
    assert_eq!(settings.playbooks_dir(), Path::new("/srv/pb"));
}

#[test]
fn test_inventory_read_and_write_in_place() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("hosts");
    fs::write(&path, "[web]\nweb1\n").unwrap();
    let inventory = InventoryFile::new(&path);

    assert_eq!(inventory.read().unwrap(), "[web]\nweb1\n");
    inventory.write("[db]\ndb1\n").unwrap();
    assert_eq!(inventory.read().unwrap(), "[db]\ndb1\n");
}

#[test]
fn test_inventory_missing_file_is_not_found_and_not_created() {
    let tmp = tempdir().unwrap();
    let inventory = InventoryFile::new(tmp.path().join("hosts"));

    assert!(matches!(inventory.read(), Err(DeckError::NotFound(_))));
    assert!(matches!(inventory.write("x"), Err(DeckError::NotFound(_))));
    assert!(!inventory.path().exists());
}

#[cfg(unix)]
#[test]
fn test_inventory_without_permissions_is_permission_denied() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().unwrap();
    let path = tmp.path().join("hosts");
    fs::write(&path, "[web]\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users bypass file modes; nothing to check then.
    if fs::read(&path).is_ok() {
        return;
    }
    let inventory = InventoryFile::new(&path);
    assert!(matches!(inventory.read(), Err(DeckError::PermissionDenied(_))));
    assert!(matches!(
        inventory.write("[db]\n"),
        Err(DeckError::PermissionDenied(_))
    ));
}

#[test]
fn test_explicit_inventory_skips_tool_default() {
    assert_eq!(explicit_inventory(Path::new("/etc/ansible/hosts")), None);
    assert_eq!(
        explicit_inventory(Path::new("/srv/hosts")),
        Some(Path::new("/srv/hosts"))
    );
}
