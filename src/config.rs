use crate::error::SpecError;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Route names starting with this prefix serve the spec itself and are never validated.
pub const API_DOCS_ROUTE_PREFIX: &str = "swagger_guard.api_docs.";

const DEFAULT_EXCLUDED_PATHS: [&str; 3] = [r"^/static/?", r"^/api-docs/?", r"^/swagger.(json|yaml)"];

/// User-facing configuration, as read from a YAML file or built in code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub schema_directory: PathBuf,
    pub schema_file: String,
    pub enable_request_validation: bool,
    pub enable_response_validation: bool,
    pub enable_path_validation: bool,
    pub enable_swagger_spec_validation: bool,
    pub exclude_paths: Vec<String>,
    pub exclude_routes: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema_directory: PathBuf::from("api_docs/"),
            schema_file: "swagger.json".to_string(),
            enable_request_validation: true,
            enable_response_validation: true,
            enable_path_validation: true,
            enable_swagger_spec_validation: true,
            exclude_paths: DEFAULT_EXCLUDED_PATHS.iter().map(|p| p.to_string()).collect(),
            exclude_routes: Vec::new(),
        }
    }
}

impl ValidationConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, SpecError> {
        serde_yaml::from_str(text).map_err(|e| SpecError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpecError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    /// Location of the root spec file.
    pub fn spec_path(&self) -> PathBuf {
        self.schema_directory.join(&self.schema_file)
    }

    pub fn settings(&self) -> Result<ValidationSettings, SpecError> {
        let exclude_paths = self
            .exclude_paths
            .iter()
            .map(|pattern| {
                // Patterns match from the start of the path.
                Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    SpecError::Config(format!("invalid exclude_paths pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ValidationSettings {
            validate_request: self.enable_request_validation,
            validate_response: self.enable_response_validation,
            validate_path: self.enable_path_validation,
            exclude_paths,
            exclude_routes: self.exclude_routes.clone(),
        })
    }
}

/// Compiled, immutable form of [`ValidationConfig`] used per request.
#[derive(Debug, Clone)]
pub struct ValidationSettings {
    pub validate_request: bool,
    pub validate_response: bool,
    pub validate_path: bool,
    pub exclude_paths: Vec<Regex>,
    pub exclude_routes: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            validate_request: true,
            validate_response: true,
            validate_path: true,
            exclude_paths: Vec::new(),
            exclude_routes: Vec::new(),
        }
    }
}

impl ValidationSettings {
    pub fn all_disabled(&self) -> bool {
        !self.validate_request && !self.validate_response && !self.validate_path
    }

    pub fn is_path_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|regex| regex.is_match(path))
    }

    pub fn is_route_excluded(&self, route_name: Option<&str>) -> bool {
        match route_name {
            Some(name) => {
                name.starts_with(API_DOCS_ROUTE_PREFIX) || self.exclude_routes.iter().any(|r| r == name)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();
        assert_eq!(config.spec_path(), PathBuf::from("api_docs/swagger.json"));
        let settings = config.settings().unwrap();
        assert!(settings.is_path_excluded("/static/app.js"));
        assert!(settings.is_path_excluded("/api-docs"));
        assert!(settings.is_path_excluded("/swagger.yaml"));
        assert!(!settings.is_path_excluded("/pets"));
        assert!(!settings.all_disabled());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ValidationConfig::from_yaml_str(
            "schema_directory: specs\nenable_response_validation: false\nexclude_routes: [health]\n",
        )
        .unwrap();
        assert_eq!(config.schema_directory, PathBuf::from("specs"));
        assert_eq!(config.schema_file, "swagger.json");
        assert!(!config.enable_response_validation);
        assert!(config.enable_request_validation);
        assert_eq!(config.exclude_paths.len(), 3);

        let settings = config.settings().unwrap();
        assert!(settings.is_route_excluded(Some("health")));
        assert!(settings.is_route_excluded(Some("swagger_guard.api_docs.json")));
        assert!(!settings.is_route_excluded(Some("pets")));
        assert!(!settings.is_route_excluded(None));
    }

    #[test]
    fn test_exclude_patterns_are_anchored_at_path_start() {
        let config = ValidationConfig {
            exclude_paths: vec!["/health".to_string(), "health".to_string(), "/a|/b".to_string()],
            ..ValidationConfig::default()
        };
        let settings = config.settings().unwrap();
        assert!(settings.is_path_excluded("/health"));
        assert!(settings.is_path_excluded("/healthz"));
        assert!(!settings.is_path_excluded("/api/healthcheck"));
        assert!(!settings.is_path_excluded("/api/health"));
        assert!(settings.is_path_excluded("/b/c"));
        assert!(!settings.is_path_excluded("/c/b"));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let config = ValidationConfig {
            exclude_paths: vec!["(".to_string()],
            ..ValidationConfig::default()
        };
        assert!(matches!(config.settings(), Err(SpecError::Config(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guard.yaml");
        std::fs::write(&path, "enable_path_validation: false\n").unwrap();
        assert!(!ValidationConfig::from_yaml_file(&path).unwrap().enable_path_validation);
    }
}
