use std::path::Path;

use anyhow::{Context, Result};
use sluice::{PgWarehouse, RunContext, load_config, run};
use store::S3Store;

use super::{copy_credentials_from_env, s3_config_from_env, warehouse_params_from_env};

/// Execute one pipeline invocation and return the process exit code.
pub fn execute(configfile: &Path) -> Result<i32> {
    let config = load_config(configfile)?;

    let store = S3Store::open(&s3_config_from_env(&config.bucket)?)
        .with_context(|| format!("opening bucket {}", config.bucket))?;
    let credentials = copy_credentials_from_env()?;
    let mut warehouse = PgWarehouse::connect(&warehouse_params_from_env()?)
        .context("connecting to the warehouse")?;

    let ctx = RunContext {
        store: &store,
        warehouse: &mut warehouse,
        config: &config,
        credentials,
    };

    let configname = configfile.display().to_string();
    match run(ctx) {
        Ok(report) => {
            print!("{}", report.render("sluice run", &configname));
            Ok(report.exit_code())
        }
        Err(failure) => {
            print!("{}", failure.report.render("sluice run", &configname));
            eprintln!("sluice: fatal: {}", failure.error);
            Ok(1)
        }
    }
}
