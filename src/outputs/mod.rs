//! Public JSON artifacts regenerated at the end of every run.
//!
//! # Submodules
//!
//! - [`json`]: The rolling window (`items.json`, `items-latest.json`)
//! - [`indexes`]: Month partitions and `metadata.json`
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── items.json
//! ├── items-latest.json
//! ├── metadata.json
//! ├── December_2024_News.json
//! └── January_2025_News.json
//! ```
//!
//! Every file is pretty-printed and replaced whole. A failed write is an
//! error for the run: readers would otherwise see a stale or missing file.

pub mod indexes;
pub mod json;

use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Serialize `value` as pretty JSON and replace `path` with it.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, &json).await?;
    debug!(bytes = json.len(), "Wrote JSON file");
    Ok(())
}
