use crate::error::SpecError;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// One parsed spec file together with the location it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument {
    value: Value,
    origin: Url,
}

impl SpecDocument {
    pub fn new(value: Value, origin: Url) -> Self {
        Self {
            value,
            origin: without_fragment(&origin),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

/// Fetches a whole document given its absolute location.
pub trait DocumentLoader: Send + Sync {
    fn fetch(&self, location: &Url) -> Result<Value, SpecError>;
}

/// Reads `file://` documents from disk as JSON or YAML.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl DocumentLoader for FileLoader {
    fn fetch(&self, location: &Url) -> Result<Value, SpecError> {
        if location.scheme() != "file" {
            return Err(SpecError::load(
                location,
                format!("no loader configured for '{}' documents", location.scheme()),
            ));
        }
        let path = location
            .to_file_path()
            .map_err(|_| SpecError::load(location, "not a valid file path"))?;
        let text = std::fs::read_to_string(&path).map_err(|e| SpecError::load(location, e))?;
        parse_document(&text, &path).map_err(|e| SpecError::load(location, e))
    }
}

/// Serves documents registered up front, for any scheme.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    documents: HashMap<String, Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: &Url, value: Value) {
        self.documents
            .insert(without_fragment(location).to_string(), value);
    }

    pub fn with_document(mut self, location: &Url, value: Value) -> Self {
        self.insert(location, value);
        self
    }
}

impl DocumentLoader for MemoryLoader {
    fn fetch(&self, location: &Url) -> Result<Value, SpecError> {
        self.documents
            .get(location.as_str())
            .cloned()
            .ok_or_else(|| SpecError::load(location, "document not found"))
    }
}

/// Cache of every document touched while resolving one spec.
#[derive(Clone)]
pub struct DocumentStore {
    loader: Arc<dyn DocumentLoader>,
    documents: HashMap<String, Arc<Value>>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("documents", &self.documents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DocumentStore {
    pub fn new(loader: Arc<dyn DocumentLoader>) -> Self {
        Self {
            loader,
            documents: HashMap::new(),
        }
    }

    /// Seeds the cache with an already loaded document.
    pub fn insert(&mut self, document: &SpecDocument) {
        self.documents.insert(
            document.origin().to_string(),
            Arc::new(document.value().clone()),
        );
    }

    /// Returns the document at `location`, loading it on first use.
    pub fn fetch(&mut self, location: &Url) -> Result<Arc<Value>, SpecError> {
        let key = without_fragment(location).to_string();
        if let Some(doc) = self.documents.get(&key) {
            return Ok(Arc::clone(doc));
        }
        tracing::debug!(location = %key, "loading referenced document");
        let doc = Arc::new(self.loader.fetch(&without_fragment(location))?);
        self.documents.insert(key, Arc::clone(&doc));
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Serialization a spec document is served in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/x-yaml",
        }
    }

    pub fn render(&self, value: &Value) -> Result<String, SpecError> {
        match self {
            Self::Json => serde_json::to_string_pretty(value)
                .map_err(|e| SpecError::SwaggerSpecInvalid(format!("cannot render JSON: {}", e))),
            Self::Yaml => serde_yaml::to_string(value)
                .map_err(|e| SpecError::SwaggerSpecInvalid(format!("cannot render YAML: {}", e))),
        }
    }
}

pub(crate) fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Parses JSON or YAML. The extension decides; unknown extensions try JSON first.
pub fn parse_document(text: &str, path: &Path) -> Result<Value, String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => serde_json::from_str(text).map_err(|e| e.to_string()),
        Some("yaml") | Some("yml") => parse_yaml(text),
        _ => serde_json::from_str(text).or_else(|_| parse_yaml(text)),
    }
}

pub fn parse_yaml(text: &str) -> Result<Value, String> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    yaml_to_json(yaml)
}

/// YAML allows non-string keys (`200:` under `responses`); JSON does not.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("unsupported number {}", n))?
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        other => Err(format!("unsupported mapping key {:?}", other)),
    }
}
