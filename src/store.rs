use crate::descriptor::document_module_id;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

const DESCRIPTOR_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("descriptor store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io { path: path.to_path_buf(), source }
    }
}

/// Directory of descriptor documents, one JSON file per descriptor.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    modules_dir: PathBuf,
}

impl DescriptorStore {
    /// Open a store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(modules_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let modules_dir = modules_dir.into();
        std::fs::create_dir_all(&modules_dir).map_err(|e| StoreError::io(&modules_dir, e))?;
        Ok(Self { modules_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.modules_dir
    }

    /// All `*.json` files in the store, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be listed.
    pub fn list_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries =
            std::fs::read_dir(&self.modules_dir).map_err(|e| StoreError::io(&self.modules_dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.modules_dir, e))?.path();
            if path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(DESCRIPTOR_EXTENSION)
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Every descriptor document that parses. Unreadable or malformed files
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// Only fails if the directory itself cannot be listed.
    pub fn load_all(&self) -> Result<Vec<Value>, StoreError> {
        let mut documents = Vec::new();
        for path in self.list_files()? {
            match load_file(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Could not load {}: {}", file_name(&path), e),
            }
        }
        Ok(documents)
    }

    /// Write a descriptor atomically: `<name>.tmp` first, then rename over `<name>`.
    ///
    /// Without a filename the name is `<module_id>_<unix seconds>.json`, with
    /// the id reduced to alphanumerics, `-` and `_`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization, the write, or the rename fails.
    pub fn save_descriptor(&self, doc: &Value, filename: Option<&str>) -> Result<PathBuf, StoreError> {
        let mut name = filename.map_or_else(|| default_file_name(doc), str::to_string);
        if !name.ends_with(".json") {
            name.push_str(".json");
        }

        let path = self.modules_dir.join(&name);
        let tmp = self.modules_dir.join(format!("{name}.tmp"));

        let text = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        Ok(path)
    }
}

/// Read and parse a single descriptor document.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be read or is not valid JSON.
pub fn load_file(path: &Path) -> Result<Value, StoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn default_file_name(doc: &Value) -> String {
    let safe_id: String = document_module_id(doc)
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("{safe_id}_{ts}.json")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
