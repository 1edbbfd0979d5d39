use playdeck::core::config::AppConfig;
use playdeck::core::document::DocumentStore;
use playdeck::core::error::DeckError;
use playdeck::core::external_action::{AnsibleExecutor, PlaybookExecutor};
use playdeck::core::rotating_log::{DEFAULT_MAX_LINES, RotatingLog};
use playdeck::core::store::Store;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Settings {
    playbooks_dir: String,
    retries: u32,
}

#[test]
fn rotating_log_keeps_newest_lines_first() {
    let tmp = tempdir().expect("tempdir");
    let log = RotatingLog::initialize(tmp.path().join("logs/app.log"), 3).expect("init");

    for line in ["a", "b", "c", "d"] {
        log.emit(line);
    }

    assert_eq!(log.lines(), vec!["d", "c", "b"]);
    let raw = fs::read_to_string(log.path()).expect("read log");
    assert_eq!(raw, "d\nc\nb\n");
}

#[test]
fn rotating_log_never_exceeds_capacity() {
    let tmp = tempdir().expect("tempdir");
    let log = RotatingLog::initialize(tmp.path().join("app.log"), 5).expect("init");

    for i in 0..40 {
        log.emit(&format!("event {i}"));
        assert!(log.lines().len() <= 5);
    }

    let lines = log.lines();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "event 39");
    assert_eq!(lines[4], "event 35");
}

#[test]
fn rotating_log_initialize_is_idempotent() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("app.log");
    let log = RotatingLog::initialize(&path, DEFAULT_MAX_LINES).expect("init");
    log.emit("kept");

    let again = RotatingLog::initialize(&path, DEFAULT_MAX_LINES).expect("re-init");
    assert_eq!(again.lines(), vec!["kept"]);
}

#[test]
fn rotating_log_concurrent_emits_lose_nothing() {
    let tmp = tempdir().expect("tempdir");
    let log = Arc::new(RotatingLog::initialize(tmp.path().join("app.log"), 500).expect("init"));
    let workers = 8;
    let per_worker = 20;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let log = Arc::clone(&log);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_worker {
                    log.emit(&format!("worker {w} line {i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }

    let lines = log.lines();
    assert_eq!(lines.len(), workers * per_worker);
    // Each worker's own lines stay in reverse emission order.
    for w in 0..workers {
        let mine: Vec<_> = lines
            .iter()
            .filter(|l| l.starts_with(&format!("worker {w} ")))
            .collect();
        assert_eq!(mine.len(), per_worker);
        assert_eq!(*mine[0], format!("worker {w} line {}", per_worker - 1));
    }
}

#[test]
fn document_load_on_missing_file_returns_default_and_creates_nothing() {
    let tmp = tempdir().expect("tempdir");
    let store: DocumentStore<Settings> = DocumentStore::new(tmp.path().join("data/config.json"));

    let default = Settings {
        playbooks_dir: "/etc/ansible/playbooks".into(),
        retries: 0,
    };
    assert_eq!(store.load(default.clone()), default);
    assert!(!store.path().exists());
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn document_save_then_load_round_trips_and_is_idempotent() {
    let tmp = tempdir().expect("tempdir");
    let store: DocumentStore<Settings> = DocumentStore::new(tmp.path().join("data/config.json"));
    let doc = Settings {
        playbooks_dir: "/srv/playbooks".into(),
        retries: 3,
    };

    store.save(&doc).expect("save");
    assert_eq!(store.load(Settings::default()), doc);
    assert_eq!(store.load(Settings::default()), doc);

    let raw = fs::read_to_string(store.path()).expect("read");
    assert!(raw.contains("\n  \"playbooks_dir\": \"/srv/playbooks\""));
}

#[test]
fn document_corruption_falls_back_to_default() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("history.json");
    fs::write(&path, "{ this is not json").expect("write garbage");
    let store: DocumentStore<Vec<String>> = DocumentStore::new(&path);

    assert!(store.load(Vec::new()).is_empty());
    assert!(matches!(
        store.try_load(),
        Err(DeckError::ParseError { .. })
    ));
    // The corrupt file is left for inspection.
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ this is not json");
}

#[test]
fn document_update_is_serialized_per_file() {
    let tmp = tempdir().expect("tempdir");
    let store = Arc::new(DocumentStore::<Vec<u32>>::new(tmp.path().join("n.json")));
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6u32)
        .map(|w| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    store
                        .update(Vec::new, |v| {
                            v.push(w * 100 + i);
                            Ok(())
                        })
                        .expect("update");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }

    assert_eq!(store.load(Vec::new()).len(), 60);
}

#[test]
fn config_missing_file_uses_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.max_log_lines, DEFAULT_MAX_LINES);
    assert_eq!(config.bind, "0.0.0.0:5000");
    let store: Store = config.store();
    assert_eq!(store.log_path(), Path::new("./logs/app.log"));
}

#[test]
fn config_file_is_read_and_validated() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("playdeck.toml");
    fs::write(
        &path,
        "root = \"/var/lib/playdeck\"\nrun_timeout_secs = 0\n",
    )
    .expect("write");

    let config = AppConfig::from_file(&path).expect("parse");
    assert_eq!(config.root, Path::new("/var/lib/playdeck"));
    assert!(matches!(config.validate(), Err(DeckError::ConfigError(_))));

    let missing = AppConfig::from_file(&tmp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, DeckError::ConfigError(_)));
}

fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    path
}

#[test]
fn executor_captures_combined_output_and_exit_code() {
    let tmp = tempdir().expect("tempdir");
    let playbook = script(
        tmp.path(),
        "site.yml",
        "echo out-line\necho err-line 1>&2\nexit 3\n",
    );
    let exec = AnsibleExecutor::new("sh", Duration::from_secs(10));

    let outcome = exec.run(&playbook, None).expect("run");
    assert!(outcome.output.contains("out-line"));
    assert!(outcome.output.contains("err-line"));
    assert_eq!(outcome.exit_code, Some(3));
    assert!(!outcome.success);
}

#[test]
fn executor_kills_runs_that_exceed_the_timeout() {
    let tmp = tempdir().expect("tempdir");
    let playbook = script(tmp.path(), "slow.yml", "echo started\nsleep 30\n");
    let exec = AnsibleExecutor::new("sh", Duration::from_millis(300));

    let started = Instant::now();
    let err = exec.run(&playbook, None).unwrap_err();
    assert!(matches!(err, DeckError::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[test]
fn executor_timeout_also_stops_forked_workers() {
    let tmp = tempdir().expect("tempdir");
    let marker = tmp.path().join("worker-finished");
    let playbook = script(
        tmp.path(),
        "forking.yml",
        &format!("(sleep 2; touch '{}') &\nsleep 30\n", marker.display()),
    );
    let exec = AnsibleExecutor::new("sh", Duration::from_millis(300));

    let started = Instant::now();
    let err = exec.run(&playbook, None).unwrap_err();
    assert!(matches!(err, DeckError::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));

    thread::sleep(Duration::from_secs(3));
    assert!(!marker.exists(), "forked worker outlived the timeout");
}
