//! Whole-file JSON persistence shared by the file-backed stores.
//!
//! Every write replaces the entire file. The new content goes to a sibling
//! temp file first and is then renamed over the old one, so a crash mid-write
//! leaves the previous complete file in place.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::{AppError, Result};
use crate::security::generate_token;

/// Read and parse a JSON file
///
/// A missing or empty file yields `T::default()`. Anything that does not parse
/// as `T` is `CorruptState`.
pub async fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!("Failed to parse {}: {}", path.display(), e);
        AppError::CorruptState(path.display().to_string())
    })
}

/// Serialize `value` and atomically replace the file at `path`
pub async fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, &generate_token()[..16]));

    if let Err(e) = fs::write(&temp_path, &bytes).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let value: Vec<String> = read_json(&dir.path().join("nope.json")).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "  \n").unwrap();

        let value: BTreeMap<String, String> = read_json(&path).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<Vec<String>> = read_json(&path).await;
        assert!(matches!(result, Err(AppError::CorruptState(_))));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shape.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        let result: Result<Vec<String>> = read_json(&path).await;
        assert!(matches!(result, Err(AppError::CorruptState(_))));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.json");

        write_json(&path, &vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        write_json(&path, &vec!["c".to_string()]).await.unwrap();

        let value: Vec<String> = read_json(&path).await.unwrap();
        assert_eq!(value, vec!["c".to_string()]);

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
