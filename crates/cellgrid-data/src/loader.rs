//! Loading pipeline: finds data files, deserializes them and builds the
//! configuration and cell registry.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers. A data directory holds:
//!
//! - `cells.{ron,toml,json}` (required): the list of cell types;
//! - `cellgrid.{ron,toml,json}` (optional): engine configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cellgrid_core::cell::{CellRegistry, RegistryError};
use cellgrid_core::config::CellgridConfig;
use cellgrid_core::id::CellTypeId;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::provider::DataCellProvider;
use crate::schema::CellTypeData;

// ===========================================================================
// Errors
// ===========================================================================

/// Failures while reading a data directory.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// Extension other than `ron`, `toml` or `json`.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// The same base name exists in more than one format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// Two cell types share a name.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The object list of a cell type does not form a valid set.
    #[error("invalid cell type '{name}' in {file}: {detail}")]
    InvalidCellType {
        file: PathBuf,
        name: String,
        detail: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats and discovery
// ===========================================================================

/// On-disk encodings of data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Lookup order used when searching a directory.
    const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// The format implied by `path`'s extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let extension = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == extension)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// Look for `<base_name>.{ron,toml,json}` in `dir`.
///
/// At most one of them may exist; two or more is a `ConflictingFormats`
/// error. `Ok(None)` when there is none.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .into_iter()
        .map(|f| dir.join(format!("{base_name}.{}", f.extension())))
        .filter(|path| path.exists());

    let first = present.next();
    if let (Some(a), Some(b)) = (&first, present.next()) {
        return Err(DataLoadError::ConflictingFormats { a: a.clone(), b });
    }
    Ok(first)
}

/// [`find_data_file`] for files the directory must contain.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    match find_data_file(dir, base_name)? {
        Some(path) => Ok(path),
        None => Err(DataLoadError::MissingRequired {
            file: base_name.to_string(),
            dir: dir.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn read(path: &Path) -> Result<(Format, String), DataLoadError> {
    let format = detect_format(path)?;
    Ok((format, std::fs::read_to_string(path)?))
}

/// Parse a whole file as `T`.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let (format, text) = read(path)?;
    match format {
        Format::Ron => ron::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&text).map_err(|e| parse_error(path, e)),
    }
}

/// Parse a file holding a list of `T`.
///
/// TOML has no top-level arrays, so there the list is read from the array
/// stored under `toml_key`. RON and JSON files are the list itself.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let (format, text) = read(path)?;
    match format {
        Format::Toml => {
            let mut table: toml::Table = toml::from_str(&text).map_err(|e| parse_error(path, e))?;
            let Some(list) = table.remove(toml_key) else {
                return Err(parse_error(path, format!("missing key '{toml_key}' in TOML file")));
            };
            list.try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
        _ => deserialize_file(path),
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything loaded from one data directory.
#[derive(Debug)]
pub struct CellgridData {
    pub config: CellgridConfig,
    pub registry: CellRegistry,
}

/// Load the optional `cellgrid.*` file, falling back to defaults.
pub fn load_config(dir: &Path) -> Result<CellgridConfig, DataLoadError> {
    match find_data_file(dir, "cellgrid")? {
        Some(path) => {
            debug!(file = %path.display(), "loading configuration");
            deserialize_file(&path)
        }
        None => Ok(CellgridConfig::default()),
    }
}

/// Load the required `cells.*` file into a registry. Type ids follow file
/// order starting at 0.
pub fn load_cell_registry(dir: &Path) -> Result<CellRegistry, DataLoadError> {
    let path = require_data_file(dir, "cells")?;
    let definitions: Vec<CellTypeData> = deserialize_list(&path, "cells")?;

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut registry = CellRegistry::new();
    for (index, data) in definitions.into_iter().enumerate() {
        if seen.insert(data.name.clone(), index).is_some() {
            return Err(DataLoadError::DuplicateName {
                file: path.clone(),
                name: data.name,
            });
        }
        let name = data.name.clone();
        let type_id = CellTypeId(index as u32);
        let provider =
            DataCellProvider::new(type_id, data).map_err(|e| DataLoadError::InvalidCellType {
                file: path.clone(),
                name,
                detail: e.to_string(),
            })?;
        registry.register(Arc::new(provider))?;
    }

    info!(file = %path.display(), cell_types = registry.len(), "loaded cell types");
    Ok(registry)
}

/// Load configuration and cell types from a data directory.
pub fn load_cellgrid_data(dir: &Path) -> Result<CellgridData, DataLoadError> {
    Ok(CellgridData {
        config: load_config(dir)?,
        registry: load_cell_registry(dir)?,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
