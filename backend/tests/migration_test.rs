//! Migration Integration Test
//!
//! Runs complete migrations from an export file on disk into the directory
//! and database destinations, covering re-runs, cleanup, dry-run and
//! cancellation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use passferry_backend::storage::{EntryDatabase, YamlEntryDatabase};
use passferry_backend::{migrate_file, CancelToken, Config, DestinationKind};

/// `\x89PNG\r\n\x1a\n`
const PNG_BASE64: &str = "iVBORw0KGgo=";

fn export_json() -> String {
    format!(
        r#"{{
        "folders": [{{"uuid": "p", "title": "Личное"}}],
        "items": [
            {{
                "category": "Finance", "title": "Bank", "subtitle": "alice",
                "fields": [
                    {{"type": "password", "label": "Password", "value": "secret", "sensitive": 1}},
                    {{"type": "url", "label": "Website", "value": "https://bank.example"}}
                ],
                "attachments": [{{"name": "id.png", "kind": "image/png", "data": "{png}"}}]
            }},
            {{"category": "Finance", "title": "Bank", "subtitle": "bob"}},
            {{"trashed": 1, "category": "Login", "title": "Почта", "folders": ["p"]}}
        ]
    }}"#,
        png = PNG_BASE64
    )
}

struct Fixture {
    dir: TempDir,
    export: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let export = dir.path().join("export.json");
        fs::write(&export, export_json()).unwrap();
        Self { dir, export }
    }

    fn store(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    fn database(&self) -> PathBuf {
        self.dir.path().join("vault.yml")
    }

    fn directory_config(&self) -> Config {
        let mut config = Config::default();
        config.destination.kind = DestinationKind::Directory;
        config.destination.store_dir = Some(self.store());
        config
    }

    fn keepass_config(&self) -> Config {
        let mut config = Config::default();
        config.destination.kind = DestinationKind::Keepass;
        config.destination.database_path = Some(self.database());
        config.destination.lock_timeout_secs = 1;
        config
    }
}

fn read(root: &Path, key: &str) -> Option<Vec<u8>> {
    fs::read(root.join(format!("{}.secret", key))).ok()
}

#[test]
fn test_directory_migration_and_rerun() {
    let fixture = Fixture::new();
    let config = fixture.directory_config();

    let report = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.changed, 3);
    assert_eq!(report.removed, 0);

    let store = fixture.store();
    let primary = read(&store, "enpass/finance/bank/data").unwrap();
    let text = String::from_utf8(primary).unwrap();
    assert!(text.starts_with("secret\n"));
    assert!(text.contains("website: https://bank.example\n"));
    assert!(!text.contains("id.png"));

    let attachment = read(&store, "enpass/finance/bank/attachments/id.png").unwrap();
    assert!(attachment.starts_with(b"\nContent-Disposition: attachment; filename=\"id.png\"\n"));
    assert!(attachment.ends_with(b"\x89PNG\r\n\x1a\n"));

    assert!(read(&store, "enpass/finance/bank_2/data").is_some());
    assert!(read(&store, "enpass/trash/login/lichnoe/pochta/data").is_some());

    let again = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();
    assert_eq!(again.changed, 0);
    assert_eq!(again.unchanged, 3);
    assert_eq!(again.removed, 0);
}

#[test]
fn test_stale_entries_are_removed() {
    let fixture = Fixture::new();
    let store = fixture.store();
    fs::create_dir_all(store.join("enpass/Old/Stale")).unwrap();
    fs::write(store.join("enpass/Old/Stale/data.secret"), "old").unwrap();
    fs::create_dir_all(store.join("personal")).unwrap();
    fs::write(store.join("personal/email"), "keep").unwrap();

    let report =
        migrate_file(&fixture.directory_config(), &fixture.export, CancelToken::new()).unwrap();

    assert_eq!(report.removed, 1);
    assert!(!store.join("enpass/Old").exists());
    assert!(store.join("personal/email").exists());
}

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = Fixture::new();
    let store = fixture.store();
    fs::create_dir_all(store.join("enpass/Old/Stale")).unwrap();
    fs::write(store.join("enpass/Old/Stale/data.secret"), "old").unwrap();

    let mut config = fixture.directory_config();
    config.run.dry_run = true;
    let report = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();

    assert_eq!(report.changed, 3);
    assert_eq!(report.removed, 1);
    assert!(store.join("enpass/Old/Stale/data.secret").exists());
    assert!(!store.join("enpass/finance").exists());
}

#[test]
fn test_item_path_nested_under_another_item() {
    let fixture = Fixture::new();
    fs::write(
        &fixture.export,
        r#"{
        "folders": [{"uuid": "b", "title": "Bank"}],
        "items": [
            {"category": "Finance", "title": "Bank", "fields": [
                {"type": "password", "label": "Password", "value": "outer"}
            ]},
            {"category": "Finance", "title": "Data", "folders": ["b"], "fields": [
                {"type": "password", "label": "Password", "value": "inner"}
            ]}
        ]
    }"#,
    )
    .unwrap();
    let config = fixture.directory_config();

    let report = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();
    assert_eq!(report.changed, 2);

    let store = fixture.store();
    let outer = read(&store, "enpass/finance/bank/data").unwrap();
    assert!(outer.starts_with(b"outer\n"));
    let inner = read(&store, "enpass/finance/bank/data/data").unwrap();
    assert!(inner.starts_with(b"inner\n"));

    let again = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();
    assert_eq!(again.unchanged, 2);
    assert_eq!(again.removed, 0);
}

#[test]
fn test_keepass_migration() {
    let fixture = Fixture::new();
    let config = fixture.keepass_config();

    let report = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();
    assert_eq!(report.changed, 3);

    let again = migrate_file(&config, &fixture.export, CancelToken::new()).unwrap();
    assert_eq!(again.unchanged, 3);

    let db = YamlEntryDatabase::open(fixture.database(), Duration::from_secs(1)).unwrap();
    assert_eq!(
        db.list("enpass/").unwrap(),
        vec![
            "enpass/finance/bank".to_string(),
            "enpass/finance/bank_2".to_string(),
            "enpass/trash/login/lichnoe/pochta".to_string(),
        ]
    );

    let bank = db.get("enpass/finance/bank").unwrap().unwrap();
    assert_eq!(bank.title(), Some("Bank"));
    assert_eq!(bank.get("UserName"), Some("alice"));
    assert!(bank.is_protected("Password"));
    assert_eq!(bank.binary("id.png"), Some(&b"\x89PNG\r\n\x1a\n"[..]));
}

#[test]
fn test_missing_export_is_source_error() {
    let fixture = Fixture::new();
    let result = migrate_file(
        &fixture.directory_config(),
        fixture.dir.path().join("absent.json"),
        CancelToken::new(),
    );

    assert!(matches!(result, Err(passferry_backend::BackendError::Source(_))));
}

#[tokio::test]
async fn test_cancelled_run_on_blocking_task() {
    let fixture = Fixture::new();
    let config = fixture.directory_config();
    let export = fixture.export.clone();

    let cancel = CancelToken::new();
    cancel.cancel();

    let report = tokio::task::spawn_blocking(move || migrate_file(&config, &export, cancel))
        .await
        .unwrap()
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.processed, 0);
    assert!(!fixture.store().join("enpass").exists());
}
