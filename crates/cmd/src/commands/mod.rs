//! Subcommands plus the environment wiring they share.
//!
//! The environment is read exactly once, here, and handed down as plain
//! values; nothing below the command layer touches env vars.

use std::env;

use anyhow::{Context, Result};
use sluice::CopyCredentials;
use store::S3Config;

pub mod run;
pub mod scan;

fn require_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

pub(crate) fn s3_config_from_env(bucket: &str) -> Result<S3Config> {
    Ok(S3Config {
        bucket: bucket.to_string(),
        region: require_env("AWS_REGION")?,
        endpoint: env::var("SLUICE_S3_ENDPOINT").ok(),
    })
}

pub(crate) fn copy_credentials_from_env() -> Result<CopyCredentials> {
    Ok(CopyCredentials {
        access_key: require_env("AWS_ACCESS_KEY_ID")?,
        secret_key: require_env("AWS_SECRET_ACCESS_KEY")?,
    })
}

pub(crate) fn warehouse_params_from_env() -> Result<String> {
    Ok(warehouse_params(
        &require_env("PGHOST")?,
        &env::var("PGPORT").unwrap_or_else(|_| "5439".to_string()),
        &require_env("PGDATABASE")?,
        &require_env("PGUSER")?,
        &require_env("PGPASSWORD")?,
    ))
}

fn warehouse_params(host: &str, port: &str, dbname: &str, user: &str, password: &str) -> String {
    format!("host={host} port={port} dbname={dbname} user={user} password={password}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_params_are_libpq_shaped() {
        let params = warehouse_params("wh.example", "5439", "analytics", "svc", "pw");
        assert_eq!(
            params,
            "host=wh.example port=5439 dbname=analytics user=svc password=pw"
        );
    }
}
