use crate::error::SpecError;
use crate::spec::document::{parse_document, SpecDocument};
use std::path::Path;
use url::Url;

/// Loads a JSON or YAML spec file as the root document of a spec.
pub fn load_spec_document(path: &Path) -> Result<SpecDocument, SpecError> {
    let absolute = std::path::absolute(path)
        .map_err(|e| SpecError::load(path.display(), format!("Failed to resolve path: {}", e)))?;
    let text = std::fs::read_to_string(&absolute)
        .map_err(|e| SpecError::load(absolute.display(), format!("Failed to open spec file: {}", e)))?;
    let value = parse_document(&text, &absolute)
        .map_err(|e| SpecError::load(absolute.display(), format!("Failed to parse spec: {}", e)))?;
    let origin = Url::from_file_path(&absolute)
        .map_err(|_| SpecError::load(absolute.display(), "not an absolute file path"))?;
    tracing::info!(spec = %origin, "loaded spec document");
    Ok(SpecDocument::new(value, origin))
}
