//! Structural validation of spec documents before they are indexed.

use crate::error::SpecError;
use crate::spec::walker::Dialect;
use jsonschema::Draft;
use openapiv3::OpenAPI;
use serde_json::Value;
use std::sync::OnceLock;

/// The published Swagger 2.0 JSON Schema (`http://swagger.io/v2/schema.json`).
const SWAGGER2_SCHEMA: &str = include_str!("../../schemas/swagger-2.0.json");

fn swagger2_validator() -> Result<&'static jsonschema::Validator, SpecError> {
    static VALIDATOR: OnceLock<Result<jsonschema::Validator, SpecError>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(SWAGGER2_SCHEMA).map_err(|e| {
                SpecError::SchemaCompilation(format!("embedded Swagger 2.0 schema: {}", e))
            })?;
            // Its refs into the draft-04 meta-schema resolve from the bundled copy.
            jsonschema::options()
                .with_draft(Draft::Draft4)
                .build(&schema)
                .map_err(|e| SpecError::SchemaCompilation(format!("Swagger 2.0 schema: {}", e)))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Checks that `document` is a well-formed spec of its declared dialect.
pub fn validate_spec_structure(document: &Value) -> Result<Dialect, SpecError> {
    let dialect = Dialect::detect(document)?;
    match dialect {
        Dialect::Swagger2 => {
            let validator = swagger2_validator()?;
            let problems: Vec<String> = validator
                .iter_errors(document)
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{} at {}", e, path)
                    }
                })
                .collect();
            if !problems.is_empty() {
                return Err(SpecError::SwaggerSpecInvalid(problems.join("; ")));
            }
        }
        Dialect::OpenApi3 => {
            serde_json::from_value::<OpenAPI>(document.clone())
                .map_err(|e| SpecError::SwaggerSpecInvalid(e.to_string()))?;
        }
    }
    Ok(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_swagger2_is_valid() {
        let doc = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/a": {"get": {
                "parameters": [{"name": "q", "in": "query", "type": "string"}, {"$ref": "#/parameters/P"}],
                "responses": {"200": {"description": "ok"}}
            }}}
        });
        assert_eq!(validate_spec_structure(&doc).unwrap(), Dialect::Swagger2);
    }

    #[test]
    fn test_missing_responses_is_invalid() {
        let doc = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/a": {"get": {}}}
        });
        let err = validate_spec_structure(&doc).unwrap_err();
        assert!(matches!(err, SpecError::SwaggerSpecInvalid(_)));
        assert!(err.to_string().contains("responses"), "{}", err);
    }

    #[test]
    fn test_body_parameter_needs_schema() {
        let doc = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/a": {"post": {
                "parameters": [{"name": "b", "in": "body"}],
                "responses": {"default": {"description": "ok"}}
            }}}
        });
        assert!(validate_spec_structure(&doc).is_err());
    }

    #[test]
    fn test_path_keys_must_start_with_slash() {
        let doc = json!({"swagger": "2.0", "info": {"title": "t", "version": "1"},
                         "paths": {"a": {}}});
        assert!(validate_spec_structure(&doc).is_err());
    }

    fn with_operation(operation: Value) -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/a": {"get": operation}}
        })
    }

    #[test]
    fn test_unknown_parameter_type_is_invalid() {
        let doc = with_operation(json!({
            "parameters": [{"name": "q", "in": "query", "type": "date"}],
            "responses": {"200": {"description": "ok"}}
        }));
        assert!(matches!(
            validate_spec_structure(&doc),
            Err(SpecError::SwaggerSpecInvalid(_))
        ));
    }

    #[test]
    fn test_path_parameter_must_be_required() {
        let doc = with_operation(json!({
            "parameters": [{"name": "id", "in": "path", "type": "integer"}],
            "responses": {"200": {"description": "ok"}}
        }));
        assert!(validate_spec_structure(&doc).is_err());
    }

    #[test]
    fn test_security_definitions_are_checked() {
        let mut doc = with_operation(json!({
            "security": [{"key": []}],
            "responses": {"200": {"description": "ok"}}
        }));
        doc["securityDefinitions"] = json!({"key": {"type": "apiKey", "name": "X-Key", "in": "header"}});
        assert!(validate_spec_structure(&doc).is_ok());

        doc["securityDefinitions"] = json!({"key": {"type": "apiKey", "name": "X-Key", "in": "cookie"}});
        assert!(validate_spec_structure(&doc).is_err());
        doc["securityDefinitions"] = json!({"key": {"type": "apiKey", "in": "header"}});
        assert!(validate_spec_structure(&doc).is_err());
        doc["securityDefinitions"] = json!({"key": {"type": "oauth2", "flow": "implicit"}});
        assert!(validate_spec_structure(&doc).is_err());
    }

    #[test]
    fn test_unknown_top_level_key_is_invalid() {
        let mut doc = with_operation(json!({"responses": {"200": {"description": "ok"}}}));
        doc["x-internal"] = json!(true);
        assert!(validate_spec_structure(&doc).is_ok());
        doc["servers"] = json!([]);
        assert!(validate_spec_structure(&doc).is_err());
    }

    #[test]
    fn test_openapi3_requires_info() {
        assert!(validate_spec_structure(&json!({"openapi": "3.0.0", "paths": {}})).is_err());
        assert!(validate_spec_structure(&json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {}
        }))
        .is_ok());
    }
}
