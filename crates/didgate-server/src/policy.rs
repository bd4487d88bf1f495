//! File-backed presentation definition policy.
//!
//! Every `*.json` file in the policy directory holds an object mapping
//! scopes to presentation definitions:
//!
//! ```json
//! {
//!   "example-scope": {
//!     "id": "pd-example",
//!     "input_descriptors": [ ... ]
//!   }
//! }
//! ```
//!
//! The same definitions apply to every owned identifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use didgate_auth::did::Did;
use didgate_auth::pe::PresentationDefinition;
use didgate_auth::provider::{PolicyBackend, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scope '{scope}' is defined more than once ({path})")]
    DuplicateScope { scope: String, path: PathBuf },
}

/// Scope to definition mapping loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct FilePolicyBackend {
    definitions: HashMap<String, PresentationDefinition>,
}

impl FilePolicyBackend {
    /// Loads all `*.json` files of `directory`, in file name order.
    pub fn load(directory: &Path) -> Result<Self, PolicyError> {
        let io_error = |source| PolicyError::Io {
            path: directory.to_path_buf(),
            source,
        };
        let mut files = std::fs::read_dir(directory)
            .map_err(io_error)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error)?;
        files.retain(|path| path.extension().is_some_and(|ext| ext == "json"));
        files.sort();

        let mut definitions = HashMap::new();
        for path in files {
            let raw = std::fs::read_to_string(&path).map_err(|source| PolicyError::Io {
                path: path.clone(),
                source,
            })?;
            let parsed: HashMap<String, PresentationDefinition> = serde_json::from_str(&raw)
                .map_err(|source| PolicyError::Parse {
                    path: path.clone(),
                    source,
                })?;
            for (scope, definition) in parsed {
                if definitions.contains_key(&scope) {
                    return Err(PolicyError::DuplicateScope { scope, path });
                }
                definitions.insert(scope, definition);
            }
        }

        tracing::info!(
            directory = %directory.display(),
            scopes = definitions.len(),
            "Loaded presentation definitions"
        );
        Ok(Self { definitions })
    }

    /// Known scopes.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

#[async_trait]
impl PolicyBackend for FilePolicyBackend {
    async fn presentation_definition(
        &self,
        _authorizer: &Did,
        scope: &str,
    ) -> Result<PresentationDefinition, ProviderError> {
        self.definitions
            .get(scope)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("no presentation definition for scope '{scope}'")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::block_on;

    use super::*;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn definition(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "input_descriptors": [{
                "id": "organization",
                "constraints": { "fields": [{ "path": ["$.credentialSubject.organization.name"] }] }
            }]
        })
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", json!({ "example-scope": definition("pd-a") }));
        write(dir.path(), "b.json", json!({ "other-scope": definition("pd-b") }));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let backend = FilePolicyBackend::load(dir.path()).unwrap();
        let mut scopes: Vec<_> = backend.scopes().collect();
        scopes.sort_unstable();
        assert_eq!(scopes, ["example-scope", "other-scope"]);

        let did = Did::parse("did:web:node.example:iam:1").unwrap();
        let pd = block_on(backend.presentation_definition(&did, "example-scope")).unwrap();
        assert_eq!(pd.id, "pd-a");
        assert!(matches!(
            block_on(backend.presentation_definition(&did, "missing")),
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_scope_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", json!({ "example-scope": definition("pd-a") }));
        write(dir.path(), "b.json", json!({ "example-scope": definition("pd-b") }));

        let err = FilePolicyBackend::load(dir.path()).unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateScope { ref scope, .. } if scope == "example-scope"));
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        assert!(matches!(
            FilePolicyBackend::load(dir.path()),
            Err(PolicyError::Parse { .. })
        ));
    }
}
