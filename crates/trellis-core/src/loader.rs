use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use trellis_model::Document;

use crate::errors::{ResolveError, Result};

/// Collaborator supplying source documents by URI
///
/// Loading is a blocking call; the resolver suspends at this boundary and
/// nowhere else. Implementations own URI semantics (paths, network
/// locations, opaque keys) and must return an owned document - the resolver
/// treats the returned value as its private deep copy and will mutate it.
pub trait DocumentLoader {
    /// Load the document identified by `uri`
    ///
    /// # Errors
    ///
    /// Returns `DocumentLoad` when the source is unreachable or unreadable.
    /// Any failure here aborts the whole resolution; there are no retries.
    fn load(&self, uri: &str) -> Result<Document>;
}

/// Loader serving documents from an in-memory map
///
/// The natural host for test fixtures and for base64-embedded resource
/// content keyed by its fragment URI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    documents: HashMap<String, Document>,
}

impl InMemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under the given URI
    pub fn insert(&mut self, uri: impl Into<String>, document: impl Into<Document>) {
        self.documents.insert(uri.into(), document.into());
    }

    /// Builder-style registration
    pub fn with(mut self, uri: impl Into<String>, document: impl Into<Document>) -> Self {
        self.insert(uri, document);
        self
    }
}

impl DocumentLoader for InMemoryLoader {
    fn load(&self, uri: &str) -> Result<Document> {
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| ResolveError::DocumentLoad {
                uri: uri.to_string(),
                source: None,
            })
    }
}

/// Loader reading JSON documents from the filesystem
///
/// URIs are interpreted as paths, relative to the configured base
/// directory when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base_dir: Option<PathBuf>,
}

impl FileLoader {
    /// Create a loader resolving URIs against the process working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader resolving URIs against `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, uri: &str) -> Result<Document> {
        let path = match &self.base_dir {
            Some(base) => base.join(uri),
            None => PathBuf::from(uri),
        };

        let bytes = fs::read(&path).map_err(|err| ResolveError::DocumentLoad {
            uri: uri.to_string(),
            source: Some(Box::new(err)),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| ResolveError::DocumentLoad {
            uri: uri.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_model::Catalog;
    use uuid::Uuid;

    #[test]
    fn test_in_memory_loader_round_trip() {
        let catalog = Catalog::new(Uuid::new_v4());
        let loader = InMemoryLoader::new().with("mem:catalog", catalog.clone());

        let loaded = loader.load("mem:catalog").unwrap();
        assert_eq!(loaded.as_catalog(), Some(&catalog));
    }

    #[test]
    fn test_missing_document_is_a_load_error() {
        let loader = InMemoryLoader::new();

        match loader.load("mem:absent") {
            Err(ResolveError::DocumentLoad { uri, .. }) => assert_eq!(uri, "mem:absent"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
