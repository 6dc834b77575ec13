//! End-of-run accounting, rendered once for the operator reading job logs.
//!
//! The report is an explicit value threaded through the run loop and
//! returned to the caller; nothing in the pipeline keeps global state.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

#[derive(Debug)]
pub struct RunReport {
    started: DateTime<Local>,
    ended: Option<DateTime<Local>>,
    /// Worklist size for this invocation.
    pub objects: usize,
    /// Fully committed and archived good.
    pub processed: usize,
    pub failed: usize,
    pub good: usize,
    pub bad: usize,
    /// Warehouse transactions committed.
    pub loaded: usize,
    /// Zero-byte or zero-data-row inputs (a subset of the failures).
    pub empty: usize,
    pub good_list: Vec<String>,
    pub bad_list: Vec<String>,
    pub empty_list: Vec<String>,
    /// Objects still pending when the run ended early.
    pub incomplete_list: Vec<String>,
    pub tables_loaded: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        RunReport {
            started: Local::now(),
            ended: None,
            objects: 0,
            processed: 0,
            failed: 0,
            good: 0,
            bad: 0,
            loaded: 0,
            empty: 0,
            good_list: Vec::new(),
            bad_list: Vec::new(),
            empty_list: Vec::new(),
            incomplete_list: Vec::new(),
            tables_loaded: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.ended = Some(Local::now());
    }

    /// 0 only when every selected object committed and archived good (or
    /// there was nothing to do).
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 { 1 } else { 0 }
    }

    /// Human-readable summary for stdout. Not machine-parsed; the exit
    /// code is the only signal the scheduler reads.
    pub fn render(&self, label: &str, configfile: &str) -> String {
        let mut out = String::new();
        if self.objects == 0 {
            let _ = writeln!(out, "Report: {label} ({configfile})");
            let _ = writeln!(out, "No objects to process.");
            return out;
        }

        let _ = writeln!(out, "Report: {label}");
        let _ = writeln!(out, "Config: {configfile}");
        if self.failed > 0 || self.bad > 0 {
            let _ = writeln!(out, "*** ATTN: A failure occurred. Please investigate logs. ***");
        }
        let started = self.started.format("%Y-%m-%d %H:%M:%S %z");
        match self.ended {
            Some(ended) => {
                let elapsed = ended.signed_duration_since(self.started);
                let _ = writeln!(
                    out,
                    "Microservice started at: {}, ended at: {}, elapsing: {}s.",
                    started,
                    ended.format("%Y-%m-%d %H:%M:%S %z"),
                    elapsed.num_seconds()
                );
            }
            None => {
                let _ = writeln!(out, "Microservice started at: {started}.");
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Objects to process: {}", self.objects);
        let _ = writeln!(out, "Objects successfully processed: {}", self.processed);
        let _ = writeln!(out, "Objects that failed to process: {}", self.failed);
        let _ = writeln!(out, "Objects output to 'good': {}", self.good);
        let _ = writeln!(out, "Objects output to 'bad': {}", self.bad);
        let _ = writeln!(out, "Loads committed to the warehouse: {}", self.loaded);
        let _ = writeln!(out, "Empty objects: {}", self.empty);

        if !self.tables_loaded.is_empty() {
            let _ = writeln!(out, "\nTables loaded:");
            for (i, table) in self.tables_loaded.iter().enumerate() {
                let _ = writeln!(out, "{}: {}", i + 1, table);
            }
        }
        if !self.good_list.is_empty() {
            let _ = writeln!(
                out,
                "\nList of objects fully ingested, loaded, and archived good:"
            );
            for (i, key) in self.good_list.iter().enumerate() {
                let _ = writeln!(out, "{}: {}", i + 1, key);
            }
        }
        if !self.bad_list.is_empty() {
            let _ = writeln!(out, "\nList of objects that failed to process:");
            for (i, key) in self.bad_list.iter().enumerate() {
                let _ = writeln!(out, "{}: {}", i + 1, key);
            }
        }
        if !self.incomplete_list.is_empty() {
            let _ = writeln!(out, "\nList of objects not processed due to early exit:");
            for (i, key) in self.incomplete_list.iter().enumerate() {
                let _ = writeln!(out, "{}: {}", i + 1, key);
            }
        }
        if !self.empty_list.is_empty() {
            let _ = writeln!(out, "\nList of empty objects:");
            for (i, key) in self.empty_list.iter().enumerate() {
                let _ = writeln!(out, "{}: {}", i + 1, key);
            }
        }
        out
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
