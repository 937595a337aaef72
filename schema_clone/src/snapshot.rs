//! Reading and writing snapshots, diffs and scripts
//!
//! The file format follows the extension: `.json`, `.yaml`/`.yml` or `.toml`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::types::SchemaDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Pick the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            _ => Err(Error::SerializationError(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Parse a value from text in the given format
pub fn parse<T: DeserializeOwned>(text: &str, format: Format) -> Result<T> {
    let value = match format {
        Format::Json => serde_json::from_str(text)?,
        Format::Yaml => serde_yaml::from_str(text)?,
        Format::Toml => {
            toml::from_str(text).map_err(|e| Error::SerializationError(e.to_string()))?
        }
    };
    Ok(value)
}

/// Render a value as text in the given format
pub fn render<T: Serialize>(value: &T, format: Format) -> Result<String> {
    let text = match format {
        Format::Json => serde_json::to_string_pretty(value)?,
        Format::Yaml => serde_yaml::to_string(value)?,
        Format::Toml => toml::to_string_pretty(value)?,
    };
    Ok(text)
}

pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path)?;
    parse(&text, format)
}

/// Load a schema snapshot
pub fn load_schema(path: impl AsRef<Path>) -> Result<SchemaDefinition> {
    let path = path.as_ref();
    let schema: SchemaDefinition = load(path).map_err(|e| match e {
        Error::IoError(_) => e,
        other => Error::SchemaAnalysisError(format!("{}: {}", path.display(), other)),
    })?;
    tracing::debug!(
        path = %path.display(),
        objects = schema.object_count(),
        "Loaded schema snapshot"
    );
    Ok(schema)
}

pub fn save<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = render(value, Format::from_path(path)?)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    Ok(())
}
