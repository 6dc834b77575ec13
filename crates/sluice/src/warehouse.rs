//! Warehouse seam: one rendered script in, one committed transaction out.
//!
//! The engine owns atomicity: the script is submitted as a single
//! multi-statement batch wrapped in BEGIN/COMMIT, so any statement failure
//! rolls back everything. Nothing here retries.

use diagnostics::log_debug;
use postgres::{Client, NoTls};

use crate::error::LoadError;

pub trait Warehouse {
    /// Submit one script as a single transaction. An `Err` means the
    /// engine rolled the whole transaction back.
    fn execute_transaction(&mut self, sql: &str) -> Result<(), LoadError>;
}

/// Warehouse over the postgres wire protocol (Redshift speaks it).
pub struct PgWarehouse {
    client: Client,
}

impl PgWarehouse {
    /// Connect with libpq-style parameters
    /// (`host=... port=... dbname=... user=... password=...`).
    pub fn connect(params: &str) -> Result<Self, LoadError> {
        let client = Client::connect(params, NoTls).map_err(|e| LoadError::Connect(e.to_string()))?;
        Ok(PgWarehouse { client })
    }
}

impl Warehouse for PgWarehouse {
    fn execute_transaction(&mut self, sql: &str) -> Result<(), LoadError> {
        self.client
            .batch_execute(sql)
            .map_err(|e| LoadError::Transaction(e.to_string()))
    }
}

/// Test double: records every script and can fail a chosen call.
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    pub scripts: Vec<String>,
    /// Zero-based index of the call that should fail, if any.
    pub fail_on_call: Option<usize>,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        RecordingWarehouse {
            scripts: Vec::new(),
            fail_on_call: Some(call),
        }
    }
}

impl Warehouse for RecordingWarehouse {
    fn execute_transaction(&mut self, sql: &str) -> Result<(), LoadError> {
        let call = self.scripts.len();
        self.scripts.push(sql.to_string());
        log_debug!("recorded transaction #{call}");
        if self.fail_on_call == Some(call) {
            return Err(LoadError::Transaction("injected failure".to_string()));
        }
        Ok(())
    }
}
