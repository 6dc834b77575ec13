//! Per-invocation feed configuration, supplied as a JSON file.
//!
//! The key set mirrors the operational configs these services have always
//! run with: object-store layout (`bucket`/`source`/`destination`/
//! `directory`/`doc`), table target (`dbschema`/`dbtable`), input dialect
//! (`delim`/`no_header`/`strip_quotes`), column schema (`column_count`/
//! `columns`/`dtype_dic_*`/`dateformat`), column operations, and the load
//! mode (`truncate`).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;

use crate::sql::{Ident, TableRef};

fn default_dbschema() -> String {
    "microservice".to_string()
}

fn default_batch_delim() -> char {
    '|'
}

fn default_null_as() -> String {
    "-".to_string()
}

/// Normalize one date/time column by parsing `format` and re-rendering a
/// canonical timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct DateFormat {
    pub field: String,
    pub format: String,
}

/// Rewrite exact cell values in one column.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceRule {
    pub field: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub bucket: String,
    pub source: String,
    pub destination: String,
    pub directory: String,
    /// Filename pattern; matched against the end of the object key.
    pub doc: String,
    #[serde(default = "default_dbschema")]
    pub dbschema: String,
    pub dbtable: String,
    pub column_count: usize,
    /// Ordered rename list applied to the parsed columns.
    pub columns: Vec<String>,
    pub delim: char,
    /// true = replace mode (scratch/rename swap), false = append mode.
    pub truncate: bool,
    #[serde(default)]
    pub no_header: bool,
    #[serde(default)]
    pub strip_quotes: bool,
    /// Cap on worklist size in append mode; ignored under `truncate`.
    #[serde(default)]
    pub file_limit: Option<usize>,
    #[serde(default)]
    pub dateformat: Vec<DateFormat>,
    #[serde(default)]
    pub replace: Vec<ReplaceRule>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Constant-valued columns appended after the parsed ones.
    #[serde(default)]
    pub add_columns: BTreeMap<String, String>,
    #[serde(default)]
    pub column_string_limit: BTreeMap<String, usize>,
    #[serde(default)]
    pub dtype_dic_strings: Vec<String>,
    #[serde(default)]
    pub dtype_dic_bools: Vec<String>,
    #[serde(default)]
    pub dtype_dic_ints: Vec<String>,
    /// Staging wire-format delimiter.
    #[serde(default = "default_batch_delim")]
    pub batch_delim: char,
    /// Staging wire-format NULL sentinel.
    #[serde(default = "default_null_as")]
    pub null_as: String,
    /// Optional owner for freshly created scratch tables.
    #[serde(default)]
    pub table_owner: Option<String>,
    /// Roles granted SELECT on freshly created scratch tables.
    #[serde(default)]
    pub grant_select_to: Vec<String>,
}

impl FeedConfig {
    /// Prefix under which input objects are listed.
    pub fn source_prefix(&self) -> String {
        format!("{}/{}/", self.source, self.directory)
    }

    /// Compiled filename pattern, anchored at the end of the key.
    pub fn doc_pattern(&self) -> Result<Regex, regex::Error> {
        if self.doc.ends_with('$') {
            Regex::new(&self.doc)
        } else {
            Regex::new(&format!("{}$", self.doc))
        }
    }

    /// The load target, with `dbschema` as the default schema.
    pub fn table_ref(&self) -> Result<TableRef> {
        TableRef::parse(&self.dbtable, &self.dbschema)
            .with_context(|| format!("bad dbtable {:?}", self.dbtable))
    }

    pub fn owner_ident(&self) -> Result<Option<Ident>> {
        match &self.table_owner {
            Some(owner) => Ok(Some(
                Ident::new(owner).with_context(|| format!("bad table_owner {:?}", owner))?,
            )),
            None => Ok(None),
        }
    }

    pub fn grant_idents(&self) -> Result<Vec<Ident>> {
        self.grant_select_to
            .iter()
            .map(|role| Ident::new(role).with_context(|| format!("bad grant role {:?}", role)))
            .collect()
    }

    /// Names visible to the column operations: the rename list plus any
    /// added constant columns.
    fn knows_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name) || self.add_columns.contains_key(name)
    }

    fn is_text_column(&self, name: &str) -> bool {
        !self.dtype_dic_ints.iter().any(|c| c == name)
            && !self.dtype_dic_bools.iter().any(|c| c == name)
            && !self.dateformat.iter().any(|d| d.field == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.column_count == 0 {
            bail!("column_count must be greater than 0");
        }
        if self.columns.len() != self.column_count {
            bail!(
                "columns lists {} names but column_count is {}",
                self.columns.len(),
                self.column_count
            );
        }
        self.doc_pattern()
            .with_context(|| format!("doc pattern {:?} does not compile", self.doc))?;
        self.table_ref()?;
        self.owner_ident()?;
        self.grant_idents()?;

        for name in self
            .dtype_dic_strings
            .iter()
            .chain(self.dtype_dic_bools.iter())
            .chain(self.dtype_dic_ints.iter())
        {
            if !self.columns.iter().any(|c| c == name) {
                bail!("dtype entry {:?} is not a configured column", name);
            }
        }
        for rule in &self.dateformat {
            if !self.columns.iter().any(|c| c == &rule.field) {
                bail!("dateformat field {:?} is not a configured column", rule.field);
            }
        }
        for name in &self.drop_columns {
            if !self.knows_column(name) {
                bail!("drop_columns entry {:?} is not a configured column", name);
            }
        }
        for rule in &self.replace {
            if !self.knows_column(&rule.field) {
                bail!("replace field {:?} is not a configured column", rule.field);
            }
        }
        for (name, _) in &self.column_string_limit {
            if !self.knows_column(name) {
                bail!(
                    "column_string_limit entry {:?} is not a configured column",
                    name
                );
            }
            if !self.is_text_column(name) {
                bail!(
                    "column_string_limit entry {:?} is not a text column",
                    name
                );
            }
        }
        for name in self.add_columns.keys() {
            if self.columns.iter().any(|c| c == name) {
                bail!("add_columns entry {:?} collides with a parsed column", name);
            }
        }
        Ok(())
    }
}

/// Read and validate a feed configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FeedConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let config: FeedConfig =
        serde_json::from_str(&content).with_context(|| "Failed to parse JSON configuration")?;

    config.validate()?;
    Ok(config)
}
