//! Persistence boundary for gate documents.
//!
//! Gates persist as one document each in a named collection, keyed by `gate_name`. The
//! variant is carried by the explicit `gate_type` tag and child populations are embedded in
//! their gate's document; children have no identifiers of their own.

use super::gate::Gate;
use crate::error::{AppResult, CytoError};
use crate::validation::is_valid_document_id;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default collection name for gate documents.
pub const GATE_COLLECTION: &str = "gates";

/// Opaque document store for gates.
pub trait GateStore {
    /// Insert or replace the document keyed by `gate.gate_name`.
    fn save(&self, gate: &Gate) -> AppResult<()>;

    /// Load a gate by name; `None` if no document exists.
    fn load(&self, gate_name: &str) -> AppResult<Option<Gate>>;

    /// Names of every stored gate, sorted.
    fn gate_names(&self) -> AppResult<Vec<String>>;
}

/// Gate documents stored as pretty-printed JSON files, one per gate.
#[derive(Debug, Clone)]
pub struct JsonGateStore {
    collection_dir: PathBuf,
}

impl JsonGateStore {
    /// Open (creating if needed) the default collection under `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        Self::open_collection(root, GATE_COLLECTION)
    }

    /// Open (creating if needed) a named collection under `root`.
    pub fn open_collection<P: AsRef<Path>>(root: P, collection: &str) -> AppResult<Self> {
        is_valid_document_id(collection)
            .map_err(|e| CytoError::Validation(format!("collection '{collection}': {e}")))?;
        let collection_dir = root.as_ref().join(collection);
        fs::create_dir_all(&collection_dir)?;
        info!(path = %collection_dir.display(), "Opened gate collection");
        Ok(Self { collection_dir })
    }

    fn document_path(&self, gate_name: &str) -> AppResult<PathBuf> {
        is_valid_document_id(gate_name)
            .map_err(|e| CytoError::Validation(format!("gate_name '{gate_name}': {e}")))?;
        Ok(self.collection_dir.join(format!("{gate_name}.json")))
    }
}

impl GateStore for JsonGateStore {
    fn save(&self, gate: &Gate) -> AppResult<()> {
        let path = self.document_path(&gate.gate_name)?;
        let json = serde_json::to_string_pretty(gate)?;
        fs::write(&path, json)?;
        debug!(gate = %gate.gate_name, gate_type = gate.gate_type(), "Saved gate document");
        Ok(())
    }

    fn load(&self, gate_name: &str) -> AppResult<Option<Gate>> {
        let path = self.document_path(gate_name)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let gate = serde_json::from_str(&json)?;
        Ok(Some(gate))
    }

    fn gate_names(&self) -> AppResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.collection_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonGateStore::open(dir.path()).unwrap();
        let gate = Gate::builder("lymphocytes", "root", "FSC-A")
            .y("SSC-A")
            .polygon()
            .unwrap();

        store.save(&gate).unwrap();
        assert_eq!(store.load("lymphocytes").unwrap(), Some(gate));
        assert_eq!(store.load("missing").unwrap(), None);
        assert_eq!(store.gate_names().unwrap(), vec!["lymphocytes"]);
    }

    #[test]
    fn rejects_unsafe_names() {
        let dir = tempdir().unwrap();
        let store = JsonGateStore::open(dir.path()).unwrap();
        assert!(store.load("../escape").is_err());
        assert!(JsonGateStore::open_collection(dir.path(), "a/b").is_err());
    }
}
