use std::{fs, path::Path};

use crate::{data::row::Row, error::Result};

/// Loads a processed series. A postcard copy is kept next to the CSV and
/// used instead of it while the CSV has not changed since.
pub fn load_series(path: &Path) -> Result<Vec<Row>> {
    if let Some(rows) = load_series_from_cache(path) {
        return Ok(rows);
    }

    let rows = load_series_from_csv(path)?;

    // Failing to write the cache only costs a slower next load
    if let Ok(encoded) = postcard::to_allocvec(&rows) {
        let _ = fs::write(path.with_extension("bin"), encoded);
    }

    Ok(rows)
}

pub fn load_series_from_csv(path: &Path) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for record in reader.deserialize() {
        rows.push(record?);
    }

    Ok(rows)
}

fn load_series_from_cache(path: &Path) -> Option<Vec<Row>> {
    let cache_path = path.with_extension("bin");

    let csv_modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    let cache_modified = fs::metadata(&cache_path).and_then(|meta| meta.modified()).ok()?;
    if cache_modified < csv_modified {
        return None;
    }

    let file = fs::read(cache_path).ok()?;
    postcard::from_bytes(&file).ok()
}
