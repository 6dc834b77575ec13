//! Swap loader: stage normalized tables, then commit them in one
//! warehouse transaction.

use diagnostics::{log_debug, log_info};
use store::ObjectStore;

use crate::error::LoadError;
use crate::keys;
use crate::sql::{
    CopyCredentials, CopyOptions, Ident, LoadMode, TableLoad, TableRef, TransactionScript,
};
use crate::tabular::Table;
use crate::warehouse::Warehouse;

/// One table's normalized data and destination.
pub struct LoadSpec {
    pub table: TableRef,
    pub batch_key: String,
    pub data: Table,
    pub mode: LoadMode,
    pub owner: Option<Ident>,
    pub grants: Vec<Ident>,
}

pub struct SwapLoader<'a> {
    pub store: &'a dyn ObjectStore,
    pub warehouse: &'a mut dyn Warehouse,
    pub bucket: &'a str,
    pub credentials: &'a CopyCredentials,
    pub options: CopyOptions,
}

impl<'a> SwapLoader<'a> {
    /// Load a single table.
    pub fn load_one(&mut self, spec: LoadSpec) -> Result<Vec<String>, LoadError> {
        self.load_group(vec![spec])
    }

    /// Load a group of tables atomically: every staging artifact is
    /// written first, then one script swaps (or appends to) all of them in
    /// a single transaction. Returns the qualified names that committed.
    pub fn load_group(&mut self, specs: Vec<LoadSpec>) -> Result<Vec<String>, LoadError> {
        let mut loads = Vec::with_capacity(specs.len());
        for spec in &specs {
            let body = spec
                .data
                .to_delimited(self.options.delimiter, &self.options.null_as);
            self.store.put(&spec.batch_key, &body)?;
            let rows = spec.data.num_rows();
            let batch_key = spec.batch_key.as_str();
            log_debug!("staged {rows} rows at {batch_key}");
            loads.push(TableLoad {
                table: spec.table.clone(),
                staging_uri: keys::staging_uri(self.bucket, &spec.batch_key),
                mode: spec.mode,
                owner: spec.owner.clone(),
                grants: spec.grants.clone(),
            });
        }

        let script = TransactionScript::build(&loads, self.options.clone());
        let redacted = script.render_redacted();
        log_info!("submitting load script:\n{redacted}");
        self.warehouse
            .execute_transaction(&script.render(self.credentials))?;

        Ok(loads.iter().map(|l| l.table.qualified()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::RecordingWarehouse;
    use store::MemoryStore;

    fn creds() -> CopyCredentials {
        CopyCredentials {
            access_key: "AKIATEST".to_string(),
            secret_key: "sekrit".to_string(),
        }
    }

    fn table() -> Table {
        Table {
            columns: vec!["id".into(), "val".into()],
            rows: vec![vec![Some("1".into()), Some("a".into())]],
        }
    }

    fn spec(qualified: &str, batch_key: &str, mode: LoadMode) -> LoadSpec {
        LoadSpec {
            table: TableRef::parse(qualified, "microservice").unwrap(),
            batch_key: batch_key.to_string(),
            data: table(),
            mode,
            owner: None,
            grants: vec![],
        }
    }

    #[test]
    fn stages_before_submitting_and_reports_tables() {
        let store = MemoryStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let credentials = creds();
        let mut loader = SwapLoader {
            store: &store,
            warehouse: &mut warehouse,
            bucket: "b",
            credentials: &credentials,
            options: CopyOptions::default(),
        };

        let loaded = loader
            .load_one(spec("s.t", "dest/batch/in/d/x.csv", LoadMode::Replace))
            .unwrap();

        assert_eq!(loaded, vec!["s.t"]);
        assert_eq!(
            store.get("dest/batch/in/d/x.csv").unwrap(),
            b"id|val\n1|a\n"
        );
        assert_eq!(warehouse.scripts.len(), 1);
        assert!(warehouse.scripts[0].contains("FROM 's3://b/dest/batch/in/d/x.csv'"));
    }

    #[test]
    fn group_load_is_one_transaction_for_all_tables() {
        let store = MemoryStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let credentials = creds();
        let mut loader = SwapLoader {
            store: &store,
            warehouse: &mut warehouse,
            bucket: "b",
            credentials: &credentials,
            options: CopyOptions::default(),
        };

        let loaded = loader
            .load_group(vec![
                spec("s.t", "dest/batch/in/d/x.csv/t.csv", LoadMode::Replace),
                spec("s.u", "dest/batch/in/d/x.csv/u.csv", LoadMode::Replace),
            ])
            .unwrap();

        assert_eq!(loaded, vec!["s.t", "s.u"]);
        assert_eq!(warehouse.scripts.len(), 1);
        let script = &warehouse.scripts[0];
        assert_eq!(script.matches("BEGIN;").count(), 1);
        assert!(script.contains("s.t_scratch"));
        assert!(script.contains("s.u_scratch"));
    }

    #[test]
    fn warehouse_failure_surfaces_as_load_error() {
        let store = MemoryStore::new();
        let mut warehouse = RecordingWarehouse::failing_on(0);
        let credentials = creds();
        let mut loader = SwapLoader {
            store: &store,
            warehouse: &mut warehouse,
            bucket: "b",
            credentials: &credentials,
            options: CopyOptions::default(),
        };

        let err = loader
            .load_one(spec("s.t", "dest/batch/in/d/x.csv", LoadMode::Append))
            .unwrap_err();
        assert!(matches!(err, LoadError::Transaction(_)));
        // the staging artifact exists; it is transient and harmless
        assert!(store.exists("dest/batch/in/d/x.csv").unwrap());
    }
}
