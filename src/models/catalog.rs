//! Model catalog documents (TOML or JSON) listing loadable descriptors.
//!
//! The catalog only describes models. Downloading files into storage is
//! handled by the application, not here.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::descriptor::{EngineKind, ModelDescriptor};
use crate::engine::error::RuntimeError;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid catalog document: {0}")]
    Parse(String),

    #[error("Duplicate model id in catalog: {0}")]
    DuplicateId(String),

    #[error("Invalid entry: {0}")]
    InvalidEntry(#[from] RuntimeError),
}

/// Ordered list of model descriptors with unique ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog, validating every entry and id uniqueness.
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self, CatalogError> {
        let catalog = Self { models };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file. `.json` files are parsed as JSON, anything else
    /// as TOML.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            serde_json::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for model in &self.models {
            model.validate()?;
            if !seen.insert(model.id.as_str()) {
                return Err(CatalogError::DuplicateId(model.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn by_engine(&self, kind: EngineKind) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter().filter(move |m| m.engine_kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[models]]
id = "qwen-0.5b"
display_name = "Qwen 0.5B Q4"
file_name = "qwen2.5-0.5b-q4_k_m.gguf"
engine_kind = "language_model"

[models.configuration]
threads = 4
contextSize = 2048
nGpuLayers = -1

[[models]]
id = "mobilenet"
display_name = "MobileNet"
file_name = "mobilenet_v2.tflite"
engine_kind = "tensor_graph"

[models.configuration]
isBundled = true
"#;

    #[test]
    fn test_parse_toml_catalog() {
        let catalog = ModelCatalog::from_toml(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        let qwen = catalog.get("qwen-0.5b").unwrap();
        assert_eq!(qwen.configuration.get_i64("nGpuLayers"), Some(-1));
        assert!(!qwen.is_bundled());
        assert!(catalog.get("mobilenet").unwrap().is_bundled());
        assert_eq!(catalog.by_engine(EngineKind::TensorGraph).count(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let a = ModelDescriptor::new("same", "a.gguf", EngineKind::LanguageModel);
        let b = ModelDescriptor::new("same", "b.tflite", EngineKind::TensorGraph);
        let err = ModelCatalog::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "same"));
    }

    #[test]
    fn test_unknown_engine_kind_rejected() {
        let doc = r#"{"models":[{"id":"a","display_name":"a","file_name":"a.bin","engine_kind":"coreml"}]}"#;
        assert!(matches!(ModelCatalog::from_json(doc), Err(CatalogError::Parse(_))));
    }
}
