use crate::error::SpecError;
use crate::spec::walker::Dialect;
use crate::violation::{map_violation_kind, Violation};
use jsonschema::{Draft, Registry, Validator};
use serde_json::{json, Value};

/// URI the shared `definitions` (or `components/schemas`) are registered under.
pub const SHARED_SCHEMAS_URI: &str = "urn:swagger-guard:spec";

/// Keywords whose values are data, not subschemas.
const LITERAL_KEYWORDS: [&str; 4] = ["enum", "default", "example", "examples"];

/// Builds the registry every section schema of one flattened spec resolves
/// its local `#/definitions/...` or `#/components/schemas/...` refs against.
pub fn build_registry(spec: &Value, dialect: Dialect) -> Result<Registry, SpecError> {
    let contents = match dialect {
        Dialect::Swagger2 => json!({
            "definitions": spec.get("definitions").cloned().unwrap_or_else(|| json!({}))
        }),
        Dialect::OpenApi3 => json!({
            "components": {
                "schemas": spec.pointer("/components/schemas").cloned().unwrap_or_else(|| json!({}))
            }
        }),
    };
    Registry::try_new(SHARED_SCHEMAS_URI, Draft::Draft4.create_resource(contents))
        .map_err(|e| SpecError::SchemaCompilation(format!("Failed to create registry: {}", e)))
}

/// Builds a Draft 4 validator whose local refs resolve through `registry`.
pub fn build_validator(
    schema: &Value,
    registry: &Registry,
    error_context: &str,
) -> Result<Validator, SpecError> {
    let mut schema = schema.clone();
    point_local_refs_at(&mut schema, SHARED_SCHEMAS_URI);
    jsonschema::options()
        .with_draft(Draft::Draft4)
        .with_registry(registry.clone())
        .build(&schema)
        .map_err(|e| {
            SpecError::SchemaCompilation(format!(
                "Failed to compile schema for {}: {}",
                error_context, e
            ))
        })
}

/// Rewrites every `#...` ref of a schema into `base#...`.
fn point_local_refs_at(schema: &mut Value, base: &str) {
    match schema {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                match key.as_str() {
                    "$ref" => {
                        if let Some(fragment) = value.as_str().filter(|r| r.starts_with('#')) {
                            *value = Value::String(format!("{}{}", base, fragment));
                        }
                    }
                    // Keys of these maps are names, so any of them may look like a keyword.
                    "properties" | "patternProperties" | "definitions" => {
                        if let Value::Object(named) = value {
                            named.values_mut().for_each(|sub| point_local_refs_at(sub, base));
                        }
                    }
                    keyword if LITERAL_KEYWORDS.contains(&keyword) => {}
                    _ => point_local_refs_at(value, base),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| point_local_refs_at(item, base)),
        _ => {}
    }
}

/// Runs `validator` and turns every error into a [`Violation`] located under `prefix`.
pub fn collect_violations(validator: &Validator, instance: &Value, prefix: &str) -> Vec<Violation> {
    validator
        .iter_errors(instance)
        .map(|e| {
            let location = format_instance_location(&e.instance_path.to_string(), prefix);
            Violation::new(map_violation_kind(&e.kind), location, e.to_string())
                .with_actual(e.instance.clone().into_owned())
        })
        .collect()
}

/// Formats instance path from JSON Schema validation error
pub fn format_instance_location(instance_path: &str, prefix: &str) -> String {
    if instance_path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, instance_path)
    }
}

#[cfg(test)]
pub(crate) fn empty_registry() -> Registry {
    build_registry(&json!({}), Dialect::Swagger2).unwrap()
}
