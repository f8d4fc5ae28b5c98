//! Source catalog.
//!
//! Retrieval targets are declared in `.citeflow/sources.yaml`:
//!
//! ```yaml
//! - id: handbook
//!   name: Employee Handbook
//!   mode: hybrid
//!   profile: handbook.assistant
//!   documents: data/handbook.jsonl
//! ```
//!
//! `documents` is a JSONL file relative to `.citeflow/`.

use crate::index::{DocumentIndex, InMemoryIndex};
use crate::types::SearchMode;
use citeflow_core::{AppError, AppResult};
use citeflow_prompt::{load_profile, SourceProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One entry of `sources.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub mode: SearchMode,

    /// Profile id under `.citeflow/profiles/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// JSONL document file, relative to `.citeflow/`
    pub documents: PathBuf,
}

/// A retrieval target ready to be searched.
#[derive(Clone)]
pub struct DocumentSource {
    pub id: String,
    pub name: String,
    pub mode: SearchMode,
    pub profile: SourceProfile,
    pub index: Arc<dyn DocumentIndex>,
}

impl DocumentSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mode: SearchMode,
        index: Arc<dyn DocumentIndex>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode,
            profile: SourceProfile::default(),
            index,
        }
    }

    pub fn with_profile(mut self, profile: SourceProfile) -> Self {
        self.profile = profile;
        self
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("profile", &self.profile.id)
            .field("index", &self.index.name())
            .finish()
    }
}

/// Find a source by id.
pub fn find_source<'a>(sources: &'a [DocumentSource], id: &str) -> Option<&'a DocumentSource> {
    sources.iter().find(|s| s.id == id)
}

/// All configured sources of a workspace.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<DocumentSource>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<DocumentSource>) -> Self {
        Self { sources }
    }

    /// Path of the catalog file for a workspace.
    pub fn catalog_path(workspace: &Path) -> PathBuf {
        workspace.join(".citeflow").join("sources.yaml")
    }

    /// Read the catalog entries without loading any documents.
    pub fn read_entries(workspace: &Path) -> AppResult<Vec<SourceEntry>> {
        let path = Self::catalog_path(workspace);
        if !path.exists() {
            tracing::debug!("No source catalog at {:?}", path);
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("Failed to read source catalog {:?}: {}", path, e))
        })?;
        let entries: Vec<SourceEntry> = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse source catalog {:?}: {}", path, e))
        })?;

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(AppError::Config("Source id cannot be empty".to_string()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(AppError::Config(format!("Duplicate source id: {}", entry.id)));
            }
        }

        Ok(entries)
    }

    /// Load every source, its documents and its profile.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let base = workspace.join(".citeflow");
        let mut sources = Vec::new();

        for entry in Self::read_entries(workspace)? {
            let index = InMemoryIndex::from_jsonl(entry.id.clone(), &base.join(&entry.documents))?;
            let profile = match &entry.profile {
                Some(profile_id) => load_profile(workspace, profile_id)?,
                None => SourceProfile::default(),
            };

            tracing::info!(
                "Loaded source '{}' ({} documents, {} mode, profile {})",
                entry.id,
                index.len(),
                entry.mode,
                profile.id
            );

            sources.push(
                DocumentSource::new(entry.id, entry.name, entry.mode, Arc::new(index))
                    .with_profile(profile),
            );
        }

        Ok(Self { sources })
    }

    pub fn get(&self, id: &str) -> Option<&DocumentSource> {
        find_source(&self.sources, id)
    }

    pub fn sources(&self) -> &[DocumentSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeflow_prompt::DEFAULT_PROFILE_ID;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join(".citeflow");
        write(
            &base.join("data/handbook.jsonl"),
            concat!(
                r#"{"title":"Vacation policy","url":"https://hr.example/vacation","date":"2024-03-01","body":"25 days"}"#,
                "\n",
                r#"{"title":"Expenses","url":"https://hr.example/expenses","date":"2023-11-15","body":"Receipts"}"#,
                "\n"
            ),
        );
        write(
            &base.join("profiles/handbook.assistant.yml"),
            "id: handbook.assistant\ntitle: Handbook Helper\napiVersion: \"1.0\"\ncreatedBy: hr\nbehavior:\n  tone: friendly\n  style: concise\npreamble: \"You are {{title}}.\"\n",
        );
        dir
    }

    #[test]
    fn test_missing_catalog_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = SourceCatalog::load(dir.path()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_load_catalog() {
        let dir = workspace();
        write(
            &SourceCatalog::catalog_path(dir.path()),
            "- id: handbook\n  name: Employee Handbook\n  mode: keyword\n  profile: handbook.assistant\n  documents: data/handbook.jsonl\n- id: plain\n  name: Plain\n  documents: data/handbook.jsonl\n",
        );

        let catalog = SourceCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let handbook = catalog.get("handbook").unwrap();
        assert_eq!(handbook.mode, SearchMode::Keyword);
        assert_eq!(handbook.profile.title, "Handbook Helper");
        assert_eq!(handbook.index.name(), "handbook");

        let plain = catalog.get("plain").unwrap();
        assert_eq!(plain.mode, SearchMode::Hybrid);
        assert_eq!(plain.profile.id, DEFAULT_PROFILE_ID);
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = workspace();
        write(
            &SourceCatalog::catalog_path(dir.path()),
            "- id: a\n  name: A\n  documents: data/handbook.jsonl\n- id: a\n  name: B\n  documents: data/handbook.jsonl\n",
        );

        match SourceCatalog::read_entries(dir.path()) {
            Err(AppError::Config(msg)) => assert!(msg.contains("Duplicate source id")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_documents_file() {
        let dir = workspace();
        write(
            &SourceCatalog::catalog_path(dir.path()),
            "- id: a\n  name: A\n  documents: data/none.jsonl\n",
        );
        assert!(matches!(SourceCatalog::load(dir.path()), Err(AppError::Config(_))));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let dir = workspace();
        write(
            &SourceCatalog::catalog_path(dir.path()),
            "- id: a\n  name: A\n  mode: fuzzy\n  documents: data/handbook.jsonl\n",
        );
        assert!(SourceCatalog::read_entries(dir.path()).is_err());
    }
}
