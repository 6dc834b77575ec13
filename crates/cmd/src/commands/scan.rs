use std::path::Path;

use anyhow::{Context, Result};
use sluice::{load_config, scanner};
use store::S3Store;

use super::s3_config_from_env;

/// Print the worklist the next run would process. Read-only: no staging,
/// no markers, no warehouse connection.
pub fn execute(configfile: &Path) -> Result<i32> {
    let config = load_config(configfile)?;
    let store = S3Store::open(&s3_config_from_env(&config.bucket)?)
        .with_context(|| format!("opening bucket {}", config.bucket))?;

    let worklist = scanner::scan(&store, &config).context("scanning the source prefix")?;
    if worklist.is_empty() {
        println!("No unprocessed objects under {}", config.source_prefix());
        return Ok(0);
    }

    println!("Objects the next run would process ({}):", worklist.len());
    for (i, meta) in worklist.iter().enumerate() {
        println!(
            "{}: {} (modified {}, {} bytes)",
            i + 1,
            meta.key,
            meta.last_modified.to_rfc3339(),
            meta.size
        );
    }
    Ok(0)
}
