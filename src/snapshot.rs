//! Stage snapshots.
//!
//! Pipeline stages hand data to each other (and to humans) through
//! pretty-printed JSON files: the SKU catalog, the discovered service plans
//! and the created prices. The core stages never re-interpret these files
//! beyond the typed models.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::models::SkuCatalog;

pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize snapshot")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
    info!(path = %path.display(), "Snapshot written");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))
}

/// Load a catalog snapshot, rejecting files that are not the full catalog
/// document (nothing downstream is meaningful without `services`).
pub fn load_catalog(path: &Path) -> Result<SkuCatalog> {
    let catalog: SkuCatalog = load_json(path)?;
    if catalog.services.is_empty() {
        bail!(
            "catalog snapshot {} contains no services; expected the full catalog document",
            path.display()
        );
    }
    info!(
        path = %path.display(),
        services = catalog.metadata.total_services,
        skus = catalog.metadata.total_skus,
        region = %catalog.metadata.region,
        "Loaded SKU catalog"
    );
    Ok(catalog)
}
