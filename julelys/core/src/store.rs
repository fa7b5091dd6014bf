//! Sequence Storage
//!
//! Persists user-authored sequences and the last active set so both survive
//! a restart. The controller talks to a [`SequenceStore`]; storage failures
//! are reported back to the caller but never stop the render pipeline.
//!
//! # Directory layout
//!
//! ```text
//! <root>/
//! ├── active_sequences.json        ["Rainbow", "Twist"]
//! └── CustomSequences/
//!     ├── snow_fall.json           {"id", "name", "description", "jsFileName"}
//!     └── snow_fall.js             script body
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sequence::SequenceInfo;

/// Name of the custom sequence subdirectory
const CUSTOM_DIR: &str = "CustomSequences";

/// Name of the active set file
const ACTIVE_FILE: &str = "active_sequences.json";

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed
    #[error("failed to access {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A stored document could not be encoded or decoded
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// No stored sequence has this name
    #[error("sequence '{0}' not found. Only custom sequences can be updated.")]
    NotFound(String),
}

/// A persisted script sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSequence {
    /// Identifying metadata
    pub info: SequenceInfo,
    /// Script body
    pub code: String,
}

/// Persistence for custom sequences and the active set
pub trait SequenceStore: Send + Sync {
    /// Persist a new sequence and return its id
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the sequence cannot be written.
    fn save(&self, name: &str, description: &str, code: &str) -> Result<String, StoreError>;

    /// Replace a stored sequence's body and, if given, its description
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no sequence has that name.
    fn update(&self, name: &str, description: Option<&str>, code: &str)
        -> Result<(), StoreError>;

    /// Every stored sequence
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be listed.
    fn load_all(&self) -> Result<Vec<StoredSequence>, StoreError>;

    /// Remember the names of the active set
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the names cannot be written.
    fn save_active(&self, names: &[String]) -> Result<(), StoreError>;

    /// Names remembered by the last [`save_active`](Self::save_active)
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a saved set exists but cannot be read.
    fn load_active(&self) -> Result<Vec<String>, StoreError>;
}

/// Storage id for a sequence name
///
/// Lowercase, with spaces and slashes replaced by underscores.
///
/// ```
/// assert_eq!(julelys_core::store::sequence_id("Snow Fall/2"), "snow_fall_2");
/// ```
#[must_use]
pub fn sequence_id(name: &str) -> String {
    name.to_lowercase().replace([' ', '/'], "_")
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    sequences: Vec<StoredSequence>,
    active: Vec<String>,
}

/// Store that keeps everything in memory
///
/// Used when persistence is disabled, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceStore for MemoryStore {
    fn save(&self, name: &str, description: &str, code: &str) -> Result<String, StoreError> {
        let id = sequence_id(name);
        let mut state = self.state.lock();
        state.sequences.retain(|stored| stored.info.id != id);
        state.sequences.push(StoredSequence {
            info: SequenceInfo::new(id.clone(), name, description),
            code: code.to_string(),
        });
        Ok(id)
    }

    fn update(
        &self,
        name: &str,
        description: Option<&str>,
        code: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let stored = state
            .sequences
            .iter_mut()
            .find(|stored| stored.info.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        stored.code = code.to_string();
        if let Some(description) = description {
            stored.info.description = description.to_string();
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<StoredSequence>, StoreError> {
        Ok(self.state.lock().sequences.clone())
    }

    fn save_active(&self, names: &[String]) -> Result<(), StoreError> {
        self.state.lock().active = names.to_vec();
        Ok(())
    }

    fn load_active(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state.lock().active.clone())
    }
}

// ============================================================================
// Directory store
// ============================================================================

/// Metadata document written next to each script file
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    id: String,
    name: String,
    description: String,
    js_file_name: String,
}

/// Store backed by a directory of JSON and script files
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Store rooted at `root`; nothing is created until the first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location: `$XDG_DATA_HOME/julelys`
    #[must_use]
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("julelys")
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn custom_dir(&self) -> PathBuf {
        self.root.join(CUSTOM_DIR)
    }

    fn active_file(&self) -> PathBuf {
        self.root.join(ACTIVE_FILE)
    }

    fn ensure_dir(path: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write through a temporary file so readers never see half a document
    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::write_atomic(path, &bytes)
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
        let bytes = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_code(&self, metadata: &Metadata) -> Result<String, StoreError> {
        let path = self.custom_dir().join(&metadata.js_file_name);
        fs::read_to_string(&path).map_err(|source| StoreError::Io { path, source })
    }

    /// Every metadata file with its path, sorted by file name
    fn metadata_files(&self) -> Result<Vec<(PathBuf, Metadata)>, StoreError> {
        let dir = self.custom_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read_json::<Metadata>(&path) {
                Ok(metadata) => files.push((path, metadata)),
                Err(e) => warn!(error = %e, "Skipping unreadable sequence metadata"),
            }
        }
        Ok(files)
    }
}

impl SequenceStore for DirectoryStore {
    fn save(&self, name: &str, description: &str, code: &str) -> Result<String, StoreError> {
        let dir = self.custom_dir();
        Self::ensure_dir(&dir)?;

        let id = sequence_id(name);
        let metadata = Metadata {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            js_file_name: format!("{id}.js"),
        };
        Self::write_atomic(&dir.join(&metadata.js_file_name), code.as_bytes())?;
        Self::write_json(&dir.join(format!("{id}.json")), &metadata)?;

        info!(sequence = %name, id = %id, "Saved custom sequence");
        Ok(id)
    }

    fn update(
        &self,
        name: &str,
        description: Option<&str>,
        code: &str,
    ) -> Result<(), StoreError> {
        let (path, mut metadata) = self
            .metadata_files()?
            .into_iter()
            .find(|(_, metadata)| metadata.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        Self::write_atomic(
            &self.custom_dir().join(&metadata.js_file_name),
            code.as_bytes(),
        )?;
        if let Some(description) = description {
            metadata.description = description.to_string();
            Self::write_json(&path, &metadata)?;
        }

        info!(sequence = %name, "Updated custom sequence");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<StoredSequence>, StoreError> {
        let mut sequences = Vec::new();
        for (path, metadata) in self.metadata_files()? {
            match self.read_code(&metadata) {
                Ok(code) => {
                    debug!(sequence = %metadata.name, "Loaded custom sequence");
                    sequences.push(StoredSequence {
                        info: SequenceInfo::new(metadata.id, metadata.name, metadata.description),
                        code,
                    });
                }
                Err(e) => warn!(path = ?path, error = %e, "Skipping sequence without script"),
            }
        }
        Ok(sequences)
    }

    fn save_active(&self, names: &[String]) -> Result<(), StoreError> {
        Self::ensure_dir(&self.root)?;
        Self::write_json(&self.active_file(), &names)?;
        debug!(sequences = ?names, "Saved active set");
        Ok(())
    }

    fn load_active(&self) -> Result<Vec<String>, StoreError> {
        let path = self.active_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::read_json(&path)
    }
}
