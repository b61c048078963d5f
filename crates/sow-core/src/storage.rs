//! Read requests and catalogs, and read/write scheme files.

use crate::curriculum::CurriculumCatalog;
use crate::model::Scheme;
use crate::request::SchemeRequest;
use crate::schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SOW_DIR: &str = ".sow";
const SCHEME_FILE: &str = "scheme.json";

/// Get the path to the working directory for a given project root.
pub fn sow_dir(project_root: &Path) -> PathBuf {
    project_root.join(SOW_DIR)
}

/// Default output path for a generated scheme.
pub fn scheme_file(project_root: &Path) -> PathBuf {
    sow_dir(project_root).join(SCHEME_FILE)
}

/// Load a scheme request; `.json` files are parsed as JSON, everything else as TOML.
pub fn load_request(path: &Path) -> Result<SchemeRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read request from {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "json") {
        SchemeRequest::from_json(&content)
    } else {
        SchemeRequest::from_toml(&content)
    }
}

/// Load a curriculum catalog from a JSON file.
pub fn load_catalog(path: &Path) -> Result<CurriculumCatalog> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog from {}", path.display()))?;
    CurriculumCatalog::from_json(&json)
}

/// Load a scheme from disk.
pub fn load_scheme(path: &Path) -> Result<Scheme> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read scheme from {}", path.display()))?;
    schema::from_json(&json)
}

/// Save a scheme to disk, creating parent directories if needed.
pub fn save_scheme(path: &Path, scheme: &Scheme) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let json = schema::to_json(scheme)?;
    fs::write(path, json).with_context(|| format!("failed to write scheme to {}", path.display()))?;

    Ok(())
}
