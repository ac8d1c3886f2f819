//! Shared depth-first traversal over spec trees.
//!
//! The walker rebuilds the tree it visits and hands every `$ref` node to a
//! [`RefHandler`], together with the structural [`Context`] the ref sits in.

use crate::error::SpecError;
use serde_json::{Map, Value};
use url::Url;

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Spec flavour; decides where collected definitions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Swagger2,
    OpenApi3,
}

impl Dialect {
    pub fn detect(document: &Value) -> Result<Self, SpecError> {
        if let Some(version) = document.get("swagger") {
            return match version.as_str() {
                Some("2.0") => Ok(Self::Swagger2),
                _ => Err(SpecError::SwaggerSpecInvalid(format!(
                    "Swagger version {} is not supported",
                    version
                ))),
            };
        }
        match document.get("openapi").and_then(Value::as_str) {
            Some(version) if version.starts_with("3.") => Ok(Self::OpenApi3),
            Some(version) => Err(SpecError::SwaggerSpecInvalid(format!(
                "OpenAPI version {} is not supported",
                version
            ))),
            None => Err(SpecError::SwaggerSpecInvalid(
                "document declares neither 'swagger' nor 'openapi'".to_string(),
            )),
        }
    }

    /// Segments of the top-level map holding collected objects of `kind`.
    pub fn collection_path(&self, kind: CollectedKind) -> &'static [&'static str] {
        match (self, kind) {
            (Self::Swagger2, CollectedKind::Schema) => &["definitions"],
            (Self::Swagger2, CollectedKind::Parameter) => &["parameters"],
            (Self::Swagger2, CollectedKind::Response) => &["responses"],
            (Self::OpenApi3, CollectedKind::Schema) => &["components", "schemas"],
            (Self::OpenApi3, CollectedKind::Parameter) => &["components", "parameters"],
            (Self::OpenApi3, CollectedKind::Response) => &["components", "responses"],
        }
    }
}

/// Objects that flattening moves into a shared top-level map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectedKind {
    Schema,
    Parameter,
    Response,
}

impl CollectedKind {
    pub const ALL: [CollectedKind; 3] = [Self::Schema, Self::Parameter, Self::Response];
}

/// Where in a spec a node sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Root,
    Paths,
    PathItem,
    Operation,
    ParameterList,
    ParameterMap,
    Parameter,
    Responses,
    Response,
    RequestBodyMap,
    RequestBody,
    ContentMap,
    MediaType,
    HeaderMap,
    Header,
    Components,
    Schema,
    SchemaMap,
    SchemaList,
    Other,
}

impl Context {
    /// Context of the value stored under `key` in an object in this context.
    pub fn child(self, key: &str, dialect: Dialect) -> Context {
        use Context::*;
        match (self, key) {
            (Root, "paths") => Paths,
            (Root, "definitions") if dialect == Dialect::Swagger2 => SchemaMap,
            (Root, "parameters") if dialect == Dialect::Swagger2 => ParameterMap,
            (Root, "responses") if dialect == Dialect::Swagger2 => Responses,
            (Root, "components") if dialect == Dialect::OpenApi3 => Components,
            (Paths, _) => PathItem,
            (PathItem, "parameters") => ParameterList,
            (PathItem, method) if HTTP_METHODS.contains(&method) => Operation,
            (Operation, "parameters") => ParameterList,
            (Operation, "responses") => Responses,
            (Operation, "requestBody") => RequestBody,
            (ParameterMap, _) => Parameter,
            (Parameter, "schema") | (Parameter, "items") => Schema,
            (Parameter, "content") => ContentMap,
            (Responses, _) => Response,
            (Response, "schema") => Schema,
            (Response, "content") => ContentMap,
            (Response, "headers") => HeaderMap,
            (RequestBodyMap, _) => RequestBody,
            (RequestBody, "content") => ContentMap,
            (ContentMap, _) => MediaType,
            (MediaType, "schema") => Schema,
            (HeaderMap, _) => Header,
            (Header, "schema") | (Header, "items") => Schema,
            (Components, "schemas") => SchemaMap,
            (Components, "parameters") => ParameterMap,
            (Components, "responses") => Responses,
            (Components, "requestBodies") => RequestBodyMap,
            (Components, "headers") => HeaderMap,
            (Schema, "properties") | (Schema, "definitions") | (Schema, "patternProperties") => {
                SchemaMap
            }
            (Schema, "items") | (Schema, "additionalProperties") | (Schema, "not") => Schema,
            (Schema, "allOf") | (Schema, "anyOf") | (Schema, "oneOf") => SchemaList,
            (SchemaMap, _) => Schema,
            _ => Other,
        }
    }

    /// Context of an array element in this context.
    pub fn element(self) -> Context {
        match self {
            Context::ParameterList => Context::Parameter,
            Context::SchemaList | Context::Schema => Context::Schema,
            _ => Context::Other,
        }
    }

    /// Which shared map a `$ref` in this context is collected into, if any.
    pub fn collected_kind(self) -> Option<CollectedKind> {
        match self {
            Context::Schema => Some(CollectedKind::Schema),
            Context::Parameter => Some(CollectedKind::Parameter),
            Context::Response => Some(CollectedKind::Response),
            _ => None,
        }
    }
}

/// Strategy deciding what a `$ref` node turns into.
pub trait RefHandler {
    fn dialect(&self) -> Dialect;

    /// `node` is the whole object holding the `$ref`; `origin` is the document it came from.
    fn handle_ref(
        &mut self,
        reference: &str,
        node: &Map<String, Value>,
        origin: &Url,
        context: Context,
    ) -> Result<Value, SpecError>;
}

/// Returns the `$ref` string of a reference node.
pub fn ref_of(node: &Value) -> Option<&str> {
    node.as_object()
        .and_then(|map| map.get("$ref"))
        .and_then(Value::as_str)
}

/// Rebuilds `node`, replacing every `$ref` node by what `handler` returns.
pub fn walk<H: RefHandler>(
    handler: &mut H,
    node: &Value,
    origin: &Url,
    context: Context,
) -> Result<Value, SpecError> {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                return handler.handle_ref(reference, map, origin, context);
            }
            let dialect = handler.dialect();
            let mut rebuilt = Map::with_capacity(map.len());
            for (key, value) in map {
                let child = walk(handler, value, origin, context.child(key, dialect))?;
                rebuilt.insert(key.clone(), child);
            }
            Ok(Value::Object(rebuilt))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| walk(handler, item, origin, context.element()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => Ok(scalar.clone()),
    }
}
