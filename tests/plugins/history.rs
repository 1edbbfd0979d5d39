use playdeck::core::error::DeckError;
use playdeck::plugins::history::{
    Action, HistoryLedger, HistoryRecord, LedgerFormat, decode, encode,
};
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn ledger_in(dir: &std::path::Path) -> HistoryLedger {
    HistoryLedger::new(dir.join("data/history.json"))
}

fn run_record(playbook: &str, output: &str) -> HistoryRecord {
    HistoryRecord::new(Action::Run, playbook, output, "Mon Jan  5 10:00:00 UTC 2026")
}

#[test]
fn test_append_preserves_order_and_clear_empties() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    assert!(ledger.list_all().is_empty());

    ledger.append(run_record("a.yml", "one")).unwrap();
    ledger.append(run_record("b.yml", "two")).unwrap();
    ledger.append(run_record("c.yml", "three")).unwrap();

    let playbooks: Vec<_> = ledger
        .list_all()
        .iter()
        .map(|r| r.playbook().unwrap().to_string())
        .collect();
    assert_eq!(playbooks, vec!["a.yml", "b.yml", "c.yml"]);

    ledger.clear().unwrap();
    assert!(ledger.list_all().is_empty());
    assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "[]");
}

#[test]
fn test_json_export_import_round_trip() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    ledger.append(run_record("site.yml", "PLAY RECAP\nok=2")).unwrap();
    ledger
        .append(HistoryRecord::new(Action::Show, "db.yml", "- hosts: db", "t2"))
        .unwrap();
    let before = ledger.list_all();

    let exported = ledger.export(LedgerFormat::Json).unwrap();
    ledger.clear().unwrap();
    let imported = ledger.import(&exported, LedgerFormat::Json).unwrap();

    assert_eq!(imported, 2);
    assert_eq!(ledger.list_all(), before);
}

#[test]
fn test_json_export_is_pretty_printed() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    ledger.append(run_record("a.yml", "x")).unwrap();

    let text = String::from_utf8(ledger.export(LedgerFormat::Json).unwrap()).unwrap();
    assert!(text.starts_with("[\n  {\n    \"action\": \"run\""));
}

#[test]
fn test_csv_export_has_header_and_blank_missing_fields() {
    let records = vec![
        run_record("a.yml", "ok"),
        HistoryRecord::from_fields([("playbook", "b.yml")]),
        run_record("c.yml", "done"),
    ];
    let text = String::from_utf8(encode(&records, LedgerFormat::Csv).unwrap()).unwrap();
    let rows: Vec<_> = text.split("\r\n").filter(|r| !r.is_empty()).collect();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], "time,playbook,action,output");
    assert_eq!(rows[2], ",b.yml,,");
}

#[test]
fn test_csv_import_keys_rows_by_header() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    let csv = "time,playbook,action,output,operator\r\n\
               t1,a.yml,run,ok,alice\r\n\
               t2,b.yml,show\r\n";

    let imported = ledger.import_file("history.csv", csv.as_bytes()).unwrap();
    assert_eq!(imported, 2);

    let records = ledger.list_all();
    assert_eq!(records[0].get("operator"), Some("alice"));
    assert_eq!(records[0].len(), 5);
    // Short rows omit the trailing columns.
    assert_eq!(records[1].action(), Some("show"));
    assert_eq!(records[1].output(), None);
}

#[test]
fn test_csv_export_reimports_with_same_fields() {
    let records = vec![run_record("a.yml", "multi\nline, \"quoted\"")];
    let bytes = encode(&records, LedgerFormat::Csv).unwrap();
    let back = decode(&bytes, LedgerFormat::Csv, "history.csv").unwrap();
    assert_eq!(back, records);
}

#[test]
fn test_unsupported_extension_leaves_ledger_untouched() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    ledger.append(run_record("a.yml", "ok")).unwrap();
    let before = fs::read(ledger.path()).unwrap();

    let err = ledger.import_file("data.txt", b"[]").unwrap_err();
    assert!(matches!(err, DeckError::FormatError(_)));
    assert_eq!(
        err.to_string(),
        "Unsupported file type: data.txt. Only .json and .csv allowed."
    );
    assert_eq!(fs::read(ledger.path()).unwrap(), before);
}

#[test]
fn test_malformed_json_import_leaves_ledger_untouched() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    ledger.append(run_record("a.yml", "ok")).unwrap();

    let bad_inputs: [&[u8]; 3] = [b"{not json", b"{\"a\": 1}", b"\"text\""];
    for bad in bad_inputs {
        let err = ledger.import_file("history.json", bad).unwrap_err();
        assert!(matches!(err, DeckError::ParseError { .. }));
    }
    assert_eq!(ledger.list_all().len(), 1);
}

#[test]
fn test_corrupt_ledger_reads_as_empty() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
    fs::write(ledger.path(), "[{").unwrap();

    assert!(ledger.list_all().is_empty());
    let csv = String::from_utf8(ledger.export(LedgerFormat::Csv).unwrap()).unwrap();
    assert_eq!(csv, "time,playbook,action,output\r\n");
}

#[test]
fn test_ensure_initialized_only_creates_once() {
    let tmp = tempdir().unwrap();
    let ledger = ledger_in(tmp.path());
    assert!(ledger.ensure_initialized().unwrap());
    ledger.append(run_record("a.yml", "ok")).unwrap();
    assert!(!ledger.ensure_initialized().unwrap());
    assert_eq!(ledger.list_all().len(), 1);
}

#[test]
fn test_concurrent_appends_lose_no_records() {
    let tmp = tempdir().unwrap();
    let ledger = Arc::new(ledger_in(tmp.path()));
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..5 {
                    ledger
                        .append(run_record(&format!("w{w}-{i}.yml"), "ok"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.list_all().len(), workers * 5);
}

#[test]
fn test_format_parses_from_cli_value() {
    assert_eq!("CSV".parse::<LedgerFormat>().unwrap(), LedgerFormat::Csv);
    assert_eq!("json".parse::<LedgerFormat>().unwrap(), LedgerFormat::Json);
    assert!("xml".parse::<LedgerFormat>().is_err());
}
