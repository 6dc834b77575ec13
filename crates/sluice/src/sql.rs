//! Statement builders for the warehouse load script.
//!
//! One script is rendered per load attempt and submitted as a single
//! transaction. Only validated identifiers are ever interpolated into SQL
//! text; data values travel through the staged artifact, never through the
//! script. The rendered script exists in two forms: one with real COPY
//! credentials for execution, and a redacted form for logs.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlError {
    #[error("unsafe SQL identifier: {0:?}")]
    BadIdent(String),

    #[error("bad table reference: {0:?}")]
    BadTableRef(String),
}

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("static pattern"))
}

/// An identifier validated against the safe-identifier pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    pub fn new(raw: &str) -> Result<Ident, SqlError> {
        if ident_pattern().is_match(raw) {
            Ok(Ident(raw.to_string()))
        } else {
            Err(SqlError::BadIdent(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: Ident,
    table: Ident,
}

impl TableRef {
    /// Parse `schema.table`, or a bare `table` resolved against
    /// `default_schema`.
    pub fn parse(raw: &str, default_schema: &str) -> Result<TableRef, SqlError> {
        let mut parts = raw.split('.');
        let result = match (parts.next(), parts.next(), parts.next()) {
            (Some(table), None, None) => TableRef {
                schema: Ident::new(default_schema)?,
                table: Ident::new(table)?,
            },
            (Some(schema), Some(table), None) => TableRef {
                schema: Ident::new(schema)?,
                table: Ident::new(table)?,
            },
            _ => return Err(SqlError::BadTableRef(raw.to_string())),
        };
        Ok(result)
    }

    /// `schema.table`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Bare table name, as required on the right-hand side of RENAME.
    pub fn table_name(&self) -> &str {
        self.table.as_str()
    }
}

/// COPY credentials. Only `render` ever sees the secret; logs go through
/// the redacted clause.
#[derive(Debug, Clone)]
pub struct CopyCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl CopyCredentials {
    fn clause(&self) -> String {
        format!(
            "aws_access_key_id={};aws_secret_access_key={}",
            self.access_key, self.secret_key
        )
    }

    fn redacted_clause() -> &'static str {
        "aws_access_key_id=AWS_ACCESS_KEY_ID;aws_secret_access_key=AWS_SECRET_ACCESS_KEY"
    }
}

/// Wire-format options shared by every COPY in one script.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub delimiter: char,
    pub null_as: String,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            delimiter: '|',
            null_as: "-".to_string(),
        }
    }
}

/// How one table receives its staged data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// COPY straight into the target; prior rows are preserved.
    Append,
    /// Load a scratch table and atomically rename it over the target.
    Replace,
}

/// One table's slice of the transaction.
#[derive(Debug, Clone)]
pub struct TableLoad {
    pub table: TableRef,
    pub staging_uri: String,
    pub mode: LoadMode,
    pub owner: Option<Ident>,
    pub grants: Vec<Ident>,
}

enum Statement {
    Sql(String),
    Copy { table: String, uri: String },
}

/// The load script for one warehouse transaction. Several replace-mode
/// blocks may be concatenated so a dependent table group swaps atomically
/// as a set.
pub struct TransactionScript {
    statements: Vec<Statement>,
    options: CopyOptions,
}

impl TransactionScript {
    pub fn build(loads: &[TableLoad], options: CopyOptions) -> TransactionScript {
        let mut statements = Vec::new();
        for load in loads {
            let target = load.table.qualified();
            match load.mode {
                LoadMode::Append => {
                    statements.push(Statement::Copy {
                        table: target,
                        uri: load.staging_uri.clone(),
                    });
                }
                LoadMode::Replace => {
                    // Leftovers from a crashed attempt are dropped up front
                    statements.push(Statement::Sql(format!(
                        "DROP TABLE IF EXISTS {}_scratch;",
                        target
                    )));
                    statements.push(Statement::Sql(format!(
                        "DROP TABLE IF EXISTS {}_old;",
                        target
                    )));
                    statements.push(Statement::Sql(format!(
                        "CREATE TABLE {}_scratch (LIKE {});",
                        target, target
                    )));
                    if let Some(owner) = &load.owner {
                        statements.push(Statement::Sql(format!(
                            "ALTER TABLE {}_scratch OWNER TO {};",
                            target, owner
                        )));
                    }
                    for grant in &load.grants {
                        statements.push(Statement::Sql(format!(
                            "GRANT SELECT ON {}_scratch TO {};",
                            target, grant
                        )));
                    }
                    statements.push(Statement::Copy {
                        table: format!("{}_scratch", target),
                        uri: load.staging_uri.clone(),
                    });
                    statements.push(Statement::Sql(format!(
                        "ALTER TABLE {} RENAME TO {}_old;",
                        target,
                        load.table.table_name()
                    )));
                    statements.push(Statement::Sql(format!(
                        "ALTER TABLE {}_scratch RENAME TO {};",
                        target,
                        load.table.table_name()
                    )));
                    statements.push(Statement::Sql(format!("DROP TABLE {}_old;", target)));
                }
            }
        }
        TransactionScript {
            statements,
            options,
        }
    }

    /// Executable form, with real credentials.
    pub fn render(&self, credentials: &CopyCredentials) -> String {
        self.render_with(&credentials.clause())
    }

    /// Log-safe form.
    pub fn render_redacted(&self) -> String {
        self.render_with(CopyCredentials::redacted_clause())
    }

    fn render_with(&self, credentials_clause: &str) -> String {
        let mut script = String::from("BEGIN;\n");
        for statement in &self.statements {
            match statement {
                Statement::Sql(text) => {
                    script.push_str(text);
                    script.push('\n');
                }
                Statement::Copy { table, uri } => {
                    script.push_str(&format!(
                        "COPY {}\nFROM '{}'\nCREDENTIALS '{}'\nIGNOREHEADER AS 1 MAXERROR AS 0 DELIMITER '{}' NULL AS '{}' ESCAPE;\n",
                        table,
                        uri.replace('\'', "''"),
                        credentials_clause,
                        self.options.delimiter,
                        self.options.null_as,
                    ));
                }
            }
        }
        script.push_str("COMMIT;\n");
        script
    }
}
