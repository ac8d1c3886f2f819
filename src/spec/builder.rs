//! Turns a flattened spec into an [`OperationIndex`].

use crate::error::{Section, SpecError};
use crate::operation_index::{HttpMethod, OperationDescriptor, OperationIndex};
use crate::spec::reference::lookup_fragment;
use crate::spec::reference_resolver::ResolveReference;
use crate::spec::walker::{ref_of, Dialect};
use crate::validation_helpers::build_registry;
use crate::validators::{
    BodyValidator, CollectionFormat, ParameterSpec, ResponseSpec, ResponseValidator,
    SectionValidator, SecurityValidator,
};
use indexmap::IndexMap;
use jsonschema::Registry;
use openapiv3::{OpenAPI, ParameterSchemaOrContent, ReferenceOr};
use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value};
use std::str::FromStr;

const MAX_REF_HOPS: usize = 32;

/// Keys of a Swagger 2.0 parameter that describe the parameter rather than its value.
const PARAMETER_ONLY_KEYS: [&str; 6] = [
    "name",
    "in",
    "required",
    "description",
    "collectionFormat",
    "allowEmptyValue",
];

const FORM_MEDIA_TYPES: [&str; 2] = ["application/x-www-form-urlencoded", "multipart/form-data"];

/// Build the operation index of a flattened Swagger 2.0 or OpenAPI 3 document
pub fn build_operation_index(spec: &Value) -> Result<OperationIndex, SpecError> {
    let index = match Dialect::detect(spec)? {
        Dialect::Swagger2 => build_swagger2(spec)?,
        Dialect::OpenApi3 => build_openapi3(spec)?,
    };
    tracing::info!(operations = index.len(), "operation index built");
    Ok(index)
}

fn is_json_media_type(media_type: &str) -> bool {
    let media_type = media_type.split(';').next().unwrap_or_default().trim();
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Follows local refs until a non-ref node is reached.
fn deref_local<'a>(spec: &'a Value, node: &'a Value) -> Result<&'a Value, SpecError> {
    let mut current = node;
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = ref_of(current) else {
            return Ok(current);
        };
        let fragment = reference.strip_prefix('#').ok_or_else(|| {
            SpecError::invalid_target(reference, "only local references are expected here")
        })?;
        let fragment = percent_decode_str(fragment).decode_utf8_lossy();
        current = lookup_fragment(spec, &fragment)
            .ok_or_else(|| SpecError::invalid_target(reference, "fragment not found"))?;
    }
    Err(SpecError::invalid_target(
        ref_of(node).unwrap_or_default(),
        "reference chain too long",
    ))
}

fn object_schema(properties: Map<String, Value>, required: Vec<String>, section: Section) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": section == Section::Header,
    });
    // Draft 4 forbids an empty `required` array.
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Document-level settings every operation inherits.
struct DocumentDefaults<'a> {
    registry: Registry,
    produces: Vec<String>,
    security_schemes: Map<String, Value>,
    security: Option<&'a Value>,
}

impl DocumentDefaults<'_> {
    fn operation_security(&self, requirements: Option<&Value>) -> Result<SecurityValidator, SpecError> {
        match requirements.or(self.security) {
            Some(requirements) => SecurityValidator::from_requirements(requirements, &self.security_schemes),
            None => Ok(SecurityValidator::none()),
        }
    }
}

// ---- Swagger 2.0 ---------------------------------------------------------

fn build_swagger2(spec: &Value) -> Result<OperationIndex, SpecError> {
    let defaults = DocumentDefaults {
        registry: build_registry(spec, Dialect::Swagger2)?,
        produces: string_list(spec.get("produces")),
        security_schemes: spec
            .get("securityDefinitions")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        security: spec.get("security"),
    };

    let mut index = OperationIndex::new();
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return Ok(index);
    };

    for (path, path_item) in paths {
        if path.starts_with("x-") {
            continue;
        }
        let path_item = deref_local(spec, path_item)?;
        let Some(item) = path_item.as_object() else {
            continue;
        };
        let shared_params = list(item.get("parameters"));

        for (method_str, operation) in item {
            let Ok(method) = HttpMethod::from_str(method_str) else {
                continue;
            };
            if method == HttpMethod::TRACE {
                continue;
            }
            let context = format!("{} {}", method, path);
            let descriptor =
                build_swagger2_operation(spec, &defaults, path, method, &shared_params, operation)
                    .map_err(|e| prefix_error(e, &context))?;
            tracing::debug!(operation = %context, "registered operation");
            index.push(descriptor);
        }
    }
    Ok(index)
}

fn prefix_error(error: SpecError, context: &str) -> SpecError {
    match error {
        SpecError::SchemaCompilation(message) => {
            SpecError::SchemaCompilation(format!("{}: {}", context, message))
        }
        other => other,
    }
}

fn list(value: Option<&Value>) -> Vec<Value> {
    value.and_then(Value::as_array).cloned().unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    list(value)
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn build_swagger2_operation(
    spec: &Value,
    defaults: &DocumentDefaults<'_>,
    path: &str,
    method: HttpMethod,
    shared_params: &[Value],
    operation: &Value,
) -> Result<OperationDescriptor, SpecError> {
    let mut descriptor = OperationDescriptor::new(path, method);
    descriptor.operation_id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string);

    // Operation-level parameters override path-level ones with the same (name, in).
    let mut merged: IndexMap<(String, String), Map<String, Value>> = IndexMap::new();
    for raw in shared_params.iter().chain(list(operation.get("parameters")).iter()) {
        let Some(parameter) = deref_local(spec, raw)?.as_object() else {
            continue;
        };
        let name = parameter.get("name").and_then(Value::as_str).unwrap_or_default();
        let location = parameter.get("in").and_then(Value::as_str).unwrap_or_default();
        merged.insert((name.to_string(), location.to_string()), parameter.clone());
    }

    descriptor.security = defaults.operation_security(operation.get("security"))?;
    // Query credentials are accepted by the otherwise closed query section.
    for name in descriptor.security.query_names() {
        merged
            .entry((name.to_string(), "query".to_string()))
            .or_insert_with(|| credential_parameter(name));
    }
    let registry = &defaults.registry;

    let in_location = |location: &str| -> Vec<&Map<String, Value>> {
        merged
            .iter()
            .filter(|((_, l), _)| l == location)
            .map(|(_, p)| p)
            .collect()
    };

    descriptor.query = swagger2_section(Section::Query, &in_location("query"), registry)?;
    descriptor.path = swagger2_section(Section::Path, &in_location("path"), registry)?;
    descriptor.header = swagger2_section(Section::Header, &in_location("header"), registry)?;
    descriptor.form = swagger2_section(Section::Form, &in_location("formData"), registry)?;

    if let Some(body) = in_location("body").first() {
        let name = body.get("name").and_then(Value::as_str).unwrap_or("body");
        let required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
        descriptor.body = BodyValidator::new(name, required, body.get("schema").cloned(), registry)?;
    }

    descriptor.responses = swagger2_responses(spec, registry, operation)?;
    let produces = match operation.get("produces") {
        Some(produces) => string_list(Some(produces)),
        None => defaults.produces.clone(),
    };
    descriptor.responses.set_produces(produces);
    Ok(descriptor)
}

fn credential_parameter(name: &str) -> Map<String, Value> {
    let mut parameter = Map::new();
    parameter.insert("name".to_string(), Value::from(name));
    parameter.insert("in".to_string(), Value::from("query"));
    parameter.insert("type".to_string(), Value::from("string"));
    parameter
}

/// Swagger parameter (or response header) object to the schema of its value.
fn property_schema(parameter: &Map<String, Value>) -> Value {
    let mut property = parameter.clone();
    for key in PARAMETER_ONLY_KEYS {
        property.shift_remove(key);
    }
    if property.get("type").and_then(Value::as_str) == Some("file") {
        property.shift_remove("type");
    }
    Value::Object(property)
}

fn swagger2_section(
    section: Section,
    parameters: &[&Map<String, Value>],
    registry: &Registry,
) -> Result<SectionValidator, SpecError> {
    if parameters.is_empty() {
        return Ok(SectionValidator::empty(section));
    }
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut specs = Vec::new();
    for parameter in parameters {
        let name = parameter.get("name").and_then(Value::as_str).unwrap_or_default();
        let whole = Value::Object((*parameter).clone());
        let format = CollectionFormat::parse(parameter.get("collectionFormat").and_then(Value::as_str));
        specs.push(ParameterSpec::from_schema(name, &whole, format));
        properties.insert(name.to_string(), property_schema(parameter));
        if parameter.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(name.to_string());
        }
    }
    let schema = object_schema(properties, required, section);
    SectionValidator::new(section, specs, Some(schema), registry, section.as_str())
}

fn swagger2_responses(
    spec: &Value,
    registry: &Registry,
    operation: &Value,
) -> Result<ResponseValidator, SpecError> {
    let mut validator = ResponseValidator::new();
    let Some(responses) = operation.get("responses").and_then(Value::as_object) else {
        return Ok(validator);
    };
    for (status, response) in responses {
        let response = deref_local(spec, response)?;
        let mut response_spec = match response.get("schema") {
            Some(schema) => {
                ResponseSpec::with_schema(schema.clone(), registry, &format!("response {}", status))?
            }
            None => ResponseSpec::void(),
        };
        if let Some(headers) = response.get("headers").and_then(Value::as_object) {
            response_spec = response_spec.with_headers(swagger2_response_headers(headers, registry)?);
        }
        if status == "default" {
            validator.set_default(response_spec);
        } else if let Ok(code) = status.parse::<u16>() {
            validator.add_response(code, response_spec);
        } else {
            tracing::warn!(status = %status, "ignoring response with unparseable status");
        }
    }
    Ok(validator)
}

fn swagger2_response_headers(
    headers: &Map<String, Value>,
    registry: &Registry,
) -> Result<SectionValidator, SpecError> {
    let mut properties = Map::new();
    let mut specs = Vec::new();
    for (name, header) in headers {
        let Some(header) = header.as_object() else {
            continue;
        };
        let whole = Value::Object(header.clone());
        let format = CollectionFormat::parse(header.get("collectionFormat").and_then(Value::as_str));
        specs.push(ParameterSpec::from_schema(name, &whole, format));
        properties.insert(name.clone(), property_schema(header));
    }
    let schema = object_schema(properties, Vec::new(), Section::Header);
    SectionValidator::new(Section::Header, specs, Some(schema), registry, "response headers")
}

// ---- OpenAPI 3 -----------------------------------------------------------

/// Converts a schema reference to JSON Value
fn schema_to_json(schema_ref: &impl serde::Serialize, context: &str) -> Result<Value, SpecError> {
    serde_json::to_value(schema_ref).map_err(|e| {
        SpecError::SchemaCompilation(format!("Failed to convert {} schema to JSON: {}", context, e))
    })
}

/// First JSON media type schema of `content`
fn json_content_schema(content: &openapiv3::Content, context: &str) -> Result<Option<Value>, SpecError> {
    content
        .iter()
        .find(|(media_type, _)| is_json_media_type(media_type))
        .and_then(|(_, media)| media.schema.as_ref())
        .map(|schema| schema_to_json(schema, context))
        .transpose()
}

fn build_openapi3(raw: &Value) -> Result<OperationIndex, SpecError> {
    let spec: OpenAPI = serde_json::from_value(raw.clone())
        .map_err(|e| SpecError::SwaggerSpecInvalid(format!("Failed to parse OpenAPI spec: {}", e)))?;
    let defaults = DocumentDefaults {
        registry: build_registry(raw, Dialect::OpenApi3)?,
        produces: Vec::new(),
        security_schemes: raw
            .pointer("/components/securitySchemes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        security: raw.get("security"),
    };

    let mut index = OperationIndex::new();
    for (path, path_item_ref) in &spec.paths.paths {
        let path_item = match path_item_ref {
            ReferenceOr::Item(item) => item,
            ReferenceOr::Reference { reference } => {
                tracing::warn!(path = %path, reference = %reference, "skipping unresolved path item reference");
                continue;
            }
        };

        for (method_str, operation) in path_item.iter() {
            let method = HttpMethod::from_str(method_str).map_err(|_| {
                SpecError::SchemaCompilation(format!("Unknown HTTP method: {}", method_str))
            })?;
            let context = format!("{} {}", method, path);
            let descriptor =
                build_openapi3_operation(&spec, &defaults, path, method, &path_item.parameters, operation)
                    .map_err(|e| prefix_error(e, &context))?;
            tracing::debug!(operation = %context, "registered operation");
            index.push(descriptor);
        }
    }
    Ok(index)
}

/// Collected parameters of one OpenAPI 3 location
#[derive(Default)]
struct SectionParts {
    properties: Map<String, Value>,
    required: Vec<String>,
    specs: Vec<ParameterSpec>,
}

impl SectionParts {
    fn into_validator(self, section: Section, registry: &Registry) -> Result<SectionValidator, SpecError> {
        if self.properties.is_empty() {
            return Ok(SectionValidator::empty(section));
        }
        let schema = object_schema(self.properties, self.required, section);
        SectionValidator::new(section, self.specs, Some(schema), registry, section.as_str())
    }
}

fn parameter_schema(data: &openapiv3::ParameterData) -> Result<Option<Value>, SpecError> {
    match &data.format {
        ParameterSchemaOrContent::Schema(schema) => {
            schema_to_json(schema, &format!("parameter '{}'", data.name)).map(Some)
        }
        ParameterSchemaOrContent::Content(content) => {
            json_content_schema(content, &format!("parameter '{}'", data.name))
        }
    }
}

fn build_openapi3_operation(
    spec: &OpenAPI,
    defaults: &DocumentDefaults<'_>,
    path: &str,
    method: HttpMethod,
    path_parameters: &[ReferenceOr<openapiv3::Parameter>],
    operation: &openapiv3::Operation,
) -> Result<OperationDescriptor, SpecError> {
    let registry = &defaults.registry;
    let mut descriptor = OperationDescriptor::new(path, method);
    descriptor.operation_id = operation.operation_id.clone();
    let requirements = operation
        .security
        .as_ref()
        .map(|security| schema_to_json(security, "security"))
        .transpose()?;
    descriptor.security = defaults.operation_security(requirements.as_ref())?;

    let mut merged: IndexMap<(String, Section), &openapiv3::Parameter> = IndexMap::new();
    for parameter_ref in path_parameters.iter().chain(operation.parameters.iter()) {
        let parameter = parameter_ref.resolve(spec)?;
        let section = match parameter {
            openapiv3::Parameter::Query { .. } => Section::Query,
            openapiv3::Parameter::Path { .. } => Section::Path,
            openapiv3::Parameter::Header { .. } => Section::Header,
            openapiv3::Parameter::Cookie { .. } => continue,
        };
        merged.insert((parameter.parameter_data_ref().name.clone(), section), parameter);
    }

    let mut query = SectionParts::default();
    let mut path_parts = SectionParts::default();
    let mut header = SectionParts::default();
    for ((name, section), parameter) in &merged {
        let data = parameter.parameter_data_ref();
        let Some(schema) = parameter_schema(data)? else {
            continue;
        };
        let format = match parameter {
            openapiv3::Parameter::Query { style, .. } => {
                let style = match style {
                    openapiv3::QueryStyle::Form => "form",
                    openapiv3::QueryStyle::SpaceDelimited => "spaceDelimited",
                    openapiv3::QueryStyle::PipeDelimited => "pipeDelimited",
                    openapiv3::QueryStyle::DeepObject => "deepObject",
                };
                CollectionFormat::from_style(style, data.explode.unwrap_or(style == "form"))
            }
            _ => CollectionFormat::Csv,
        };
        let parts = match section {
            Section::Query => &mut query,
            Section::Path => &mut path_parts,
            _ => &mut header,
        };
        parts.specs.push(ParameterSpec::from_schema(name.clone(), &schema, format));
        parts.properties.insert(name.clone(), schema);
        if data.required {
            parts.required.push(name.clone());
        }
    }
    for name in descriptor.security.query_names() {
        if !query.properties.contains_key(name) {
            let schema = json!({"type": "string"});
            query.specs.push(ParameterSpec::from_schema(name, &schema, CollectionFormat::Csv));
            query.properties.insert(name.to_string(), schema);
        }
    }
    descriptor.query = query.into_validator(Section::Query, registry)?;
    descriptor.path = path_parts.into_validator(Section::Path, registry)?;
    descriptor.header = header.into_validator(Section::Header, registry)?;

    if let Some(request_body_ref) = &operation.request_body {
        let request_body = request_body_ref.resolve(spec)?;
        if let Some(schema) = json_content_schema(&request_body.content, "request body")? {
            descriptor.body = BodyValidator::new("body", request_body.required, Some(schema), registry)?;
        } else if let Some(media) = request_body
            .content
            .iter()
            .find(|(media_type, _)| FORM_MEDIA_TYPES.contains(&media_type.as_str()))
            .map(|(_, media)| media)
        {
            if let Some(schema) = &media.schema {
                descriptor.form = openapi3_form_section(schema_to_json(schema, "form body")?, registry)?;
            }
        }
    }

    let (responses, produces) = openapi3_responses(spec, registry, &operation.responses)?;
    descriptor.responses = responses;
    descriptor.responses.set_produces(produces);
    Ok(descriptor)
}

fn openapi3_form_section(schema: Value, registry: &Registry) -> Result<SectionValidator, SpecError> {
    let specs: Vec<ParameterSpec> = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| ParameterSpec::from_schema(name.clone(), property, CollectionFormat::Multi))
                .collect()
        })
        .unwrap_or_default();
    SectionValidator::new(Section::Form, specs, Some(schema), registry, "form")
}

fn openapi3_responses(
    spec: &OpenAPI,
    registry: &Registry,
    responses: &openapiv3::Responses,
) -> Result<(ResponseValidator, Vec<String>), SpecError> {
    let mut validator = ResponseValidator::new();
    let mut produces: Vec<String> = Vec::new();

    for (status_code, response_ref) in &responses.responses {
        let status = match status_code {
            openapiv3::StatusCode::Code(code) => *code,
            openapiv3::StatusCode::Range(range) => {
                tracing::debug!(range, "status ranges are not validated");
                continue;
            }
        };
        let response = response_ref.resolve(spec)?;
        collect_media_types(&response.content, &mut produces);
        validator.add_response(status, openapi3_response_spec(spec, registry, response, &status.to_string())?);
    }

    if let Some(default_ref) = &responses.default {
        let response = default_ref.resolve(spec)?;
        collect_media_types(&response.content, &mut produces);
        validator.set_default(openapi3_response_spec(spec, registry, response, "default")?);
    }
    Ok((validator, produces))
}

fn collect_media_types(content: &openapiv3::Content, produces: &mut Vec<String>) {
    for media_type in content.keys() {
        if !produces.contains(media_type) {
            produces.push(media_type.clone());
        }
    }
}

fn openapi3_response_spec(
    spec: &OpenAPI,
    registry: &Registry,
    response: &openapiv3::Response,
    status: &str,
) -> Result<ResponseSpec, SpecError> {
    let context = format!("response {}", status);
    let response_spec = if response.content.is_empty() {
        ResponseSpec::void()
    } else {
        match json_content_schema(&response.content, &context)? {
            Some(schema) => ResponseSpec::with_schema(schema, registry, &context)?,
            None => {
                tracing::warn!(status, "response declares no JSON schema; body is not validated");
                ResponseSpec::with_schema(json!({}), registry, &context)?
            }
        }
    };

    if response.headers.is_empty() {
        return Ok(response_spec);
    }
    let mut parts = SectionParts::default();
    for (name, header_ref) in &response.headers {
        let header = header_ref.resolve(spec)?;
        let schema = match &header.format {
            ParameterSchemaOrContent::Schema(schema) => schema_to_json(schema, &format!("header '{}'", name))?,
            ParameterSchemaOrContent::Content(content) => {
                match json_content_schema(content, &format!("header '{}'", name))? {
                    Some(schema) => schema,
                    None => continue,
                }
            }
        };
        parts.specs.push(ParameterSpec::from_schema(name.clone(), &schema, CollectionFormat::Csv));
        parts.properties.insert(name.clone(), schema);
        if header.required {
            parts.required.push(name.clone());
        }
    }
    Ok(response_spec.with_headers(parts.into_validator(Section::Header, registry)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Payload, SimpleResponse};
    use crate::operation_index::MatchResult;
    use crate::violation::ViolationKind;

    fn swagger2_spec() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "pets", "version": "1"},
            "produces": ["application/json"],
            "paths": {
                "/pets/{id}": {
                    "parameters": [
                        {"$ref": "#/parameters/Id"},
                        {"name": "verbose", "in": "query", "type": "boolean"}
                    ],
                    "get": {
                        "operationId": "getPet",
                        "parameters": [
                            {"name": "verbose", "in": "query", "type": "integer", "required": true},
                            {"name": "X-Trace", "in": "header", "type": "string", "description": "trace id"}
                        ],
                        "responses": {
                            "200": {"description": "ok", "schema": {"$ref": "#/definitions/Pet"},
                                    "headers": {"X-Rate": {"type": "integer"}}},
                            "204": {"description": "gone"}
                        }
                    },
                    "post": {
                        "consumes": ["multipart/form-data"],
                        "parameters": [
                            {"name": "photo", "in": "formData", "type": "file", "required": true},
                            {"name": "tags", "in": "formData", "type": "array",
                             "items": {"type": "string"}, "collectionFormat": "multi"}
                        ],
                        "responses": {"default": {"description": "anything"}}
                    },
                    "put": {
                        "parameters": [
                            {"name": "pet", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Pet"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            },
            "parameters": {
                "Id": {"name": "id", "in": "path", "required": true, "type": "integer"}
            },
            "definitions": {
                "Pet": {"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}
            }
        })
    }

    fn operation<'a>(index: &'a OperationIndex, method: HttpMethod) -> &'a OperationDescriptor {
        match index.find_operation("/pets/1", method) {
            MatchResult::Matched(operation) => operation,
            MatchResult::Unmatched => panic!("{} not indexed", method),
        }
    }

    #[test]
    fn test_swagger2_sections() {
        let index = build_operation_index(&swagger2_spec()).unwrap();
        assert_eq!(index.len(), 3);

        let get = operation(&index, HttpMethod::GET);
        assert_eq!(get.operation_id.as_deref(), Some("getPet"));
        let query = get.query.schema().unwrap();
        assert_eq!(query["properties"]["verbose"], json!({"type": "integer"}));
        assert_eq!(query["required"], json!(["verbose"]));
        assert_eq!(query["additionalProperties"], json!(false));
        assert_eq!(get.path.schema().unwrap()["required"], json!(["id"]));

        let header = get.header.schema().unwrap();
        assert_eq!(header["additionalProperties"], json!(true));
        assert_eq!(header["properties"]["X-Trace"], json!({"type": "string"}));
        assert!(header.get("required").is_none());
        assert!(get.form.schema().is_none());
        assert!(get.body.schema().is_none());
    }

    #[test]
    fn test_swagger2_file_and_array_form_params() {
        let index = build_operation_index(&swagger2_spec()).unwrap();
        let post = operation(&index, HttpMethod::POST);
        let form = post.form.schema().unwrap();
        assert_eq!(form["properties"]["photo"], json!({}));
        assert_eq!(form["required"], json!(["photo"]));

        let raw = vec![
            ("photo".to_string(), "bytes".to_string()),
            ("tags".to_string(), "a".to_string()),
            ("tags".to_string(), "b".to_string()),
        ];
        let cast = post.form.cast(&raw);
        assert_eq!(cast["tags"], json!(["a", "b"]));
        assert!(post.form.validate(&cast).is_ok());
    }

    #[test]
    fn test_swagger2_body_uses_definitions() {
        let index = build_operation_index(&swagger2_spec()).unwrap();
        let put = operation(&index, HttpMethod::PUT);
        assert_eq!(put.body.name(), "pet");
        assert!(put.body.validate(&Payload::Json(json!({"name": "rex"}))).is_ok());
        let violations = put.body.validate(&Payload::Json(json!({}))).unwrap_err();
        assert_eq!(violations[0].kind, ViolationKind::MissingRequired);
        let missing = put.body.validate(&Payload::Empty).unwrap_err();
        assert_eq!(missing[0].message, "pet is required");
    }

    #[test]
    fn test_swagger2_responses() {
        let index = build_operation_index(&swagger2_spec()).unwrap();
        let get = operation(&index, HttpMethod::GET);
        assert_eq!(get.responses.produces(), ["application/json".to_string()]);
        assert!(get.responses.spec_for(204).unwrap().is_void());
        assert!(get
            .responses
            .validate(&SimpleResponse::json(200, json!({"name": "rex"})).with_header("X-Rate", "3"))
            .is_ok());
        assert!(get
            .responses
            .validate(&SimpleResponse::json(200, json!({"name": "rex"})).with_header("X-Rate", "many"))
            .is_err());

        let post = operation(&index, HttpMethod::POST);
        assert!(post.responses.spec_for(201).unwrap().is_void());
        assert!(post.responses.spec_for(418).is_none());
    }

    #[test]
    fn test_swagger2_security_requirements() {
        let spec = json!({
            "swagger": "2.0",
            "info": {"title": "keys", "version": "1"},
            "securityDefinitions": {
                "key": {"type": "apiKey", "name": "api_key", "in": "query"},
                "basic": {"type": "basic"}
            },
            "security": [{"key": []}],
            "paths": {"/pets/{id}": {
                "get": {
                    "parameters": [{"name": "id", "in": "path", "required": true, "type": "integer"}],
                    "responses": {"200": {"description": "ok"}}
                },
                "delete": {
                    "security": [{"basic": []}],
                    "responses": {"204": {"description": "gone"}}
                },
                "head": {
                    "security": [],
                    "responses": {"200": {"description": "ok"}}
                }
            }}
        });
        let index = build_operation_index(&spec).unwrap();

        let get = operation(&index, HttpMethod::GET);
        assert!(get.security.is_enforced());
        assert_eq!(get.query.schema().unwrap()["properties"]["api_key"], json!({"type": "string"}));
        let cast = get.query.cast(&[("api_key".to_string(), "k".to_string())]);
        assert!(get.query.validate(&cast).is_ok());
        assert!(get.security.validate(&[("api_key".to_string(), "k".to_string())], &[]).is_ok());

        let delete = operation(&index, HttpMethod::DELETE);
        assert!(delete.security.validate(&[("api_key".to_string(), "k".to_string())], &[]).is_err());
        assert!(delete
            .security
            .validate(&[], &[("Authorization".to_string(), "Basic dTpw".to_string())])
            .is_ok());

        assert!(!operation(&index, HttpMethod::HEAD).security.is_enforced());
    }

    #[test]
    fn test_openapi3_security_schemes() {
        let spec = json!({
            "openapi": "3.0.3",
            "info": {"title": "keys", "version": "1"},
            "security": [{"bearer": []}],
            "paths": {"/pets/{id}": {"get": {
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                "responses": {"200": {"description": "ok"}}
            }}},
            "components": {"securitySchemes": {
                "bearer": {"type": "http", "scheme": "bearer"}
            }}
        });
        let index = build_operation_index(&spec).unwrap();
        let get = operation(&index, HttpMethod::GET);
        let violations = get.security.validate(&[], &[]).unwrap_err();
        assert_eq!(violations[0].kind, ViolationKind::MissingCredentials);
        assert!(get
            .security
            .validate(&[], &[("authorization".to_string(), "Bearer t".to_string())])
            .is_ok());
    }

    #[test]
    fn test_openapi3_operation() {
        let spec = json!({
            "openapi": "3.0.3",
            "info": {"title": "pets", "version": "1"},
            "paths": {
                "/pets/{id}": {
                    "parameters": [{"$ref": "#/components/parameters/Id"}],
                    "get": {
                        "parameters": [
                            {"name": "tags", "in": "query", "style": "pipeDelimited",
                             "schema": {"type": "array", "items": {"type": "integer"}}},
                            {"name": "session", "in": "cookie", "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {"description": "ok", "content": {"application/json": {
                                "schema": {"$ref": "#/components/schemas/Pet"}}}},
                            "204": {"description": "none"}
                        }
                    },
                    "post": {
                        "requestBody": {"$ref": "#/components/requestBodies/NewPet"},
                        "responses": {"201": {"description": "created"}}
                    }
                }
            },
            "components": {
                "parameters": {"Id": {"name": "id", "in": "path", "required": true,
                                      "schema": {"type": "integer"}}},
                "requestBodies": {"NewPet": {"required": true, "content": {"application/json": {
                    "schema": {"$ref": "#/components/schemas/Pet"}}}}},
                "schemas": {"Pet": {"type": "object", "required": ["name"],
                                    "properties": {"name": {"type": "string"}}}}
            }
        });
        let index = build_operation_index(&spec).unwrap();
        assert_eq!(index.len(), 2);

        let get = operation(&index, HttpMethod::GET);
        assert_eq!(get.path.schema().unwrap()["properties"]["id"]["type"], "integer");
        let cast = get.query.cast(&[("tags".to_string(), "1|2".to_string())]);
        assert_eq!(cast, json!({"tags": [1, 2]}));
        assert!(get.query.validate(&cast).is_ok());
        assert!(get.header.schema().is_none());
        assert!(get.responses.validate(&SimpleResponse::json(200, json!({"name": "rex"}))).is_ok());
        assert!(get.responses.validate(&SimpleResponse::json(200, json!({}))).is_err());
        assert!(get.responses.spec_for(204).unwrap().is_void());

        let post = operation(&index, HttpMethod::POST);
        assert!(post.body.is_required());
        assert!(post.body.validate(&Payload::Json(json!({"name": "rex"}))).is_ok());
        assert!(post.body.validate(&Payload::Json(json!({"name": 1}))).is_err());
    }
}
