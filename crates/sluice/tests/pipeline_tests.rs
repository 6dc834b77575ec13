//! End-to-end runs over the in-memory store and a recording warehouse.

use chrono::{TimeZone, Utc};
use sluice::warehouse::RecordingWarehouse;
use sluice::{CopyCredentials, FeedConfig, RunContext, RunReport, run};
use store::{MemoryStore, ObjectStore};

fn config(overrides: serde_json::Value) -> FeedConfig {
    let mut base = serde_json::json!({
        "bucket": "b",
        "source": "in",
        "destination": "dest",
        "directory": "d",
        "doc": "\\.csv$",
        "dbtable": "s.t",
        "column_count": 2,
        "columns": ["id", "val"],
        "delim": ",",
        "truncate": true,
        "no_header": true
    });
    if let (Some(base_map), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
        for (k, v) in extra {
            base_map.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

fn credentials() -> CopyCredentials {
    CopyCredentials {
        access_key: "AKIATEST".to_string(),
        secret_key: "sekrit".to_string(),
    }
}

fn seed(store: &MemoryStore, key: &str, minute: u32, body: &[u8]) {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
    store.put_with_modified(key, body, t);
}

fn run_once(
    store: &MemoryStore,
    warehouse: &mut RecordingWarehouse,
    config: &FeedConfig,
) -> RunReport {
    run(RunContext {
        store,
        warehouse,
        config,
        credentials: credentials(),
    })
    .expect("run should not abort fatally")
}

#[test]
fn example_scenario_replace_load() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({}));
    seed(&store, "in/d/x.csv", 0, b"1,a\n2,b\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.objects, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.loaded, 1);
    assert_eq!(report.tables_loaded, vec!["s.t"]);

    // staging artifact in the bulk-load wire format
    assert_eq!(
        store.get("dest/batch/in/d/x.csv").unwrap(),
        b"id|val\n1|a\n2|b\n"
    );

    // one transaction holding the full scratch/rename dance
    assert_eq!(warehouse.scripts.len(), 1);
    let script = &warehouse.scripts[0];
    assert_eq!(script.matches("BEGIN;").count(), 1);
    assert_eq!(script.matches("COMMIT;").count(), 1);
    assert!(script.contains("CREATE TABLE s.t_scratch (LIKE s.t);"));
    assert!(script.contains("COPY s.t_scratch\nFROM 's3://b/dest/batch/in/d/x.csv'"));
    assert!(script.contains("IGNOREHEADER AS 1 MAXERROR AS 0 DELIMITER '|' NULL AS '-' ESCAPE;"));
    assert!(script.contains("ALTER TABLE s.t RENAME TO t_old;"));
    assert!(script.contains("ALTER TABLE s.t_scratch RENAME TO t;"));
    assert!(script.contains("DROP TABLE s.t_old;"));

    // outcome marker, original left in place
    assert!(store.exists("dest/good/in/d/x.csv").unwrap());
    assert!(!store.exists("dest/bad/in/d/x.csv").unwrap());
    assert!(store.exists("in/d/x.csv").unwrap());
}

#[test]
fn second_run_is_a_noop() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({}));
    seed(&store, "in/d/x.csv", 0, b"1,a\n2,b\n");

    let first = run_once(&store, &mut warehouse, &cfg);
    assert_eq!(first.exit_code(), 0);
    let scripts_after_first = warehouse.scripts.len();
    let mutations_after_first = store.mutation_count();

    let second = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(second.objects, 0);
    assert_eq!(second.exit_code(), 0);
    assert_eq!(warehouse.scripts.len(), scripts_after_first);
    assert_eq!(store.mutation_count(), mutations_after_first);
}

#[test]
fn most_recent_only_picks_the_latest_snapshot() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({}));
    seed(&store, "in/d/t1.csv", 1, b"1,a\n");
    seed(&store, "in/d/t2.csv", 2, b"2,b\n");
    seed(&store, "in/d/t3.csv", 3, b"3,c\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.objects, 1);
    assert_eq!(report.good_list, vec!["in/d/t3.csv"]);
    assert!(store.exists("dest/good/in/d/t3.csv").unwrap());
    assert!(!store.exists("dest/good/in/d/t1.csv").unwrap());
    assert!(!store.exists("dest/bad/in/d/t1.csv").unwrap());
    assert_eq!(warehouse.scripts.len(), 1);
}

#[test]
fn batch_mode_appends_in_ascending_order() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({"truncate": false}));
    seed(&store, "in/d/late.csv", 9, b"2,b\n");
    seed(&store, "in/d/early.csv", 1, b"1,a\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.good_list, vec!["in/d/early.csv", "in/d/late.csv"]);
    assert_eq!(warehouse.scripts.len(), 2);
    for script in &warehouse.scripts {
        assert!(script.contains("COPY s.t\nFROM"));
        assert!(!script.contains("_scratch"));
    }
}

#[test]
fn mid_batch_failure_fails_fast_and_walks_back() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({
        "truncate": false,
        "dtype_dic_ints": ["id"]
    }));
    seed(&store, "in/d/a.csv", 1, b"1,a\n");
    seed(&store, "in/d/b.csv", 2, b"nope,b\n");
    seed(&store, "in/d/c.csv", 3, b"3,c\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 1);
    // only the first object reached the warehouse
    assert_eq!(warehouse.scripts.len(), 1);

    // the failing object is marked bad
    assert!(store.exists("dest/bad/in/d/b.csv").unwrap());
    // the earlier success is walked back: bad marker, good marker removed
    assert!(store.exists("dest/bad/in/d/a.csv").unwrap());
    assert!(!store.exists("dest/good/in/d/a.csv").unwrap());
    // the later object was never touched and stays pending
    assert!(!store.exists("dest/good/in/d/c.csv").unwrap());
    assert!(!store.exists("dest/bad/in/d/c.csv").unwrap());
    assert_eq!(report.incomplete_list, vec!["in/d/c.csv"]);

    assert_eq!(report.failed, 1);
    assert_eq!(report.good, 0);
    assert_eq!(report.bad, 2);
    assert!(report.bad_list.contains(&"in/d/a.csv".to_string()));
    assert!(report.bad_list.contains(&"in/d/b.csv".to_string()));
}

#[test]
fn fully_marked_prefix_is_a_noop_run() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({"truncate": false}));
    seed(&store, "in/d/a.csv", 1, b"1,a\n");
    seed(&store, "in/d/b.csv", 2, b"2,b\n");
    store.put("dest/good/in/d/a.csv", b"1,a\n").unwrap();
    store.put("dest/bad/in/d/b.csv", b"2,b\n").unwrap();
    let mutations_before = store.mutation_count();

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.objects, 0);
    assert_eq!(report.exit_code(), 0);
    assert!(warehouse.scripts.is_empty());
    assert_eq!(store.mutation_count(), mutations_before);
}

#[test]
fn short_rows_are_rejected_and_marked_bad() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({}));
    seed(&store, "in/d/x.csv", 0, b"1\n2\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 1);
    assert!(warehouse.scripts.is_empty());
    assert!(store.exists("dest/bad/in/d/x.csv").unwrap());
    assert_eq!(report.empty, 0);
}

#[test]
fn zero_byte_object_is_marked_bad_and_counted_empty() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({}));
    seed(&store, "in/d/x.csv", 0, b"");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 1);
    assert!(store.exists("dest/bad/in/d/x.csv").unwrap());
    assert_eq!(report.empty, 1);
    assert_eq!(report.empty_list, vec!["in/d/x.csv"]);
    assert!(warehouse.scripts.is_empty());
}

#[test]
fn warehouse_failure_marks_bad_and_exits_nonzero() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::failing_on(0);
    let cfg = config(serde_json::json!({}));
    seed(&store, "in/d/x.csv", 0, b"1,a\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 1);
    assert_eq!(warehouse.scripts.len(), 1);
    assert!(store.exists("dest/bad/in/d/x.csv").unwrap());
    assert!(!store.exists("dest/good/in/d/x.csv").unwrap());
}

#[test]
fn ddl_decorations_follow_the_config() {
    let store = MemoryStore::new();
    let mut warehouse = RecordingWarehouse::new();
    let cfg = config(serde_json::json!({
        "table_owner": "microservice",
        "grant_select_to": ["looker", "datamodeling"]
    }));
    seed(&store, "in/d/x.csv", 0, b"1,a\n");

    let report = run_once(&store, &mut warehouse, &cfg);

    assert_eq!(report.exit_code(), 0);
    let script = &warehouse.scripts[0];
    assert!(script.contains("ALTER TABLE s.t_scratch OWNER TO microservice;"));
    assert!(script.contains("GRANT SELECT ON s.t_scratch TO looker;"));
    assert!(script.contains("GRANT SELECT ON s.t_scratch TO datamodeling;"));
}
