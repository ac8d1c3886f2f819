use crate::config::ValidationConfig;
use crate::error::SpecError;
use crate::operation_index::OperationIndex;
use crate::spec::{
    build_operation_index, collect_ref_files, load_spec_document, resolve, validate_spec_structure,
    Dialect, DocumentLoader, DocumentStore, FileLoader, ResolveMode, SchemaFormat, SpecDocument,
};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// An ingested spec: the root document, its flattened form and the operation
/// index built from it. Served renditions are computed on first use.
#[derive(Debug)]
pub struct SwaggerSpec {
    root: SpecDocument,
    dialect: Dialect,
    store: DocumentStore,
    flattened: Value,
    index: OperationIndex,
    dereferenced: OnceLock<Result<Value, SpecError>>,
    rendered_json: OnceLock<Result<String, SpecError>>,
    rendered_yaml: OnceLock<Result<String, SpecError>>,
}

impl SwaggerSpec {
    /// Loads `schema_directory/schema_file` from disk.
    pub fn from_config(config: &ValidationConfig) -> Result<Self, SpecError> {
        let root = load_spec_document(&config.spec_path())?;
        Self::from_document(root, Arc::new(FileLoader), config.enable_swagger_spec_validation)
    }

    /// Ingests an already loaded root document; `loader` serves the documents it references.
    pub fn from_document(
        root: SpecDocument,
        loader: Arc<dyn DocumentLoader>,
        validate_structure: bool,
    ) -> Result<Self, SpecError> {
        let mut store = DocumentStore::new(loader);
        let flattened = resolve(&root, &mut store, ResolveMode::Flatten)?;
        let dialect = if validate_structure {
            validate_spec_structure(&flattened)?
        } else {
            Dialect::detect(&flattened)?
        };
        let index = build_operation_index(&flattened)?;
        tracing::info!(
            spec = %root.origin(),
            documents = store.len(),
            operations = index.len(),
            "swagger spec ingested"
        );
        Ok(Self {
            root,
            dialect,
            store,
            flattened,
            index,
            dereferenced: OnceLock::new(),
            rendered_json: OnceLock::new(),
            rendered_yaml: OnceLock::new(),
        })
    }

    pub fn root(&self) -> &SpecDocument {
        &self.root
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn index(&self) -> &OperationIndex {
        &self.index
    }

    /// Self-contained document with shared objects collected under marshaled keys.
    pub fn flattened(&self) -> &Value {
        &self.flattened
    }

    /// Inlined document, computed once. Targets outside the root document that
    /// refer back to themselves are kept once under a marshaled key.
    pub fn dereferenced(&self) -> Result<&Value, SpecError> {
        self.dereferenced
            .get_or_init(|| {
                tracing::debug!(spec = %self.root.origin(), "dereferencing spec");
                let mut store = self.store.clone();
                resolve(&self.root, &mut store, ResolveMode::Inline)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Self-contained contract served back to clients: the flattened document
    /// rendered as JSON or YAML, computed once per format.
    pub fn rendered(&self, format: SchemaFormat) -> Result<&str, SpecError> {
        let cell = match format {
            SchemaFormat::Json => &self.rendered_json,
            SchemaFormat::Yaml => &self.rendered_yaml,
        };
        cell.get_or_init(|| {
            tracing::debug!(spec = %self.root.origin(), format = format.extension(), "rendering spec");
            format.render(&self.flattened)
        })
            .as_deref()
            .map_err(Clone::clone)
    }

    /// Files making up this spec, relative to the root document's directory.
    pub fn ref_files(&self) -> Result<Vec<String>, SpecError> {
        let mut store = self.store.clone();
        collect_ref_files(&self.root, &mut store)
    }
}
