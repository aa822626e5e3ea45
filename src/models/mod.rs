//! Model descriptors and catalogs.

pub mod catalog;
pub mod descriptor;

pub use catalog::{CatalogError, ModelCatalog};
pub use descriptor::{EngineKind, ModelConfig, ModelDescriptor};
