use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ExportError, Result};

/// Shape of a finished export as far as validation cares. Items are opaque.
#[derive(Debug, Deserialize)]
struct ExportDocument {
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    folders: Vec<Value>,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub item_count: usize,
    pub folder_count: usize,
}

/// Check that `path` holds a plain-text JSON export with at least one item.
pub fn validate_export(path: &Path) -> Result<ExportSummary> {
    let raw = fs::read(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: ExportDocument =
        serde_json::from_slice(&raw).map_err(|source| ExportError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;

    if document.encrypted {
        return Err(ExportError::Encrypted {
            path: path.to_path_buf(),
        });
    }
    if document.items.is_empty() {
        return Err(ExportError::NoItems {
            path: path.to_path_buf(),
        });
    }

    Ok(ExportSummary {
        path: path.to_path_buf(),
        item_count: document.items.len(),
        folder_count: document.folders.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("export.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_valid_export() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"encrypted": false, "folders": [{"id": "f1"}], "items": [{"id": "a"}, {"id": "b"}]}"#,
        );

        let summary = validate_export(&path).unwrap();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.folder_count, 1);
    }

    #[test]
    fn test_encrypted_export_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"encrypted": true, "data": "2.abc|def"}"#);
        assert!(matches!(
            validate_export(&path),
            Err(ExportError::Encrypted { .. })
        ));
    }

    #[test]
    fn test_export_without_items_is_rejected() {
        let dir = TempDir::new().unwrap();
        for body in [r#"{"items": []}"#, r#"{"folders": []}"#] {
            let path = write(&dir, body);
            assert!(matches!(
                validate_export(&path),
                Err(ExportError::NoItems { .. })
            ));
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "not json");
        assert!(matches!(
            validate_export(&path),
            Err(ExportError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            validate_export(&dir.path().join("nope.json")),
            Err(ExportError::Io { .. })
        ));
    }
}
