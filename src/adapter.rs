//! Framework-neutral views of the request and response being validated.

use serde_json::Value;
use std::collections::HashMap;

/// Decoded message body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Text(String),
}

impl Payload {
    /// Whether the body counts as absent for a `void` response.
    pub fn is_void(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Json(value) => match value {
                Value::Null => true,
                Value::Object(map) => map.is_empty(),
                _ => false,
            },
            Self::Text(text) => matches!(text.trim(), "" | "{}" | "null"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Json(_) => false,
        }
    }

    /// JSON view of the body; text that does not parse stays a string.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::Json(value) => Some(value.clone()),
            Self::Text(text) => {
                Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())))
            }
        }
    }
}

pub trait RequestAdapter {
    fn method(&self) -> &str;
    fn path(&self) -> &str;

    /// Name of the route the framework matched, if any.
    fn route_name(&self) -> Option<&str> {
        None
    }

    /// Path parameters as extracted by the framework's router.
    fn path_params(&self) -> Option<HashMap<String, String>> {
        None
    }

    fn query(&self) -> Vec<(String, String)>;
    fn headers(&self) -> Vec<(String, String)>;
    fn content_type(&self) -> Option<&str>;
    fn form(&self) -> Vec<(String, String)>;
    fn body(&self) -> Payload;
}

pub trait ResponseAdapter {
    fn status(&self) -> u16;
    fn content_type(&self) -> Option<&str>;
    fn headers(&self) -> Vec<(String, String)>;
    fn body(&self) -> Payload;
}

/// Owned request, for callers without a framework request type at hand.
#[derive(Debug, Clone, Default)]
pub struct SimpleRequest {
    pub method: String,
    pub path: String,
    pub route_name: Option<String>,
    pub path_params: Option<HashMap<String, String>>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub form: Vec<(String, String)>,
    pub body: Payload,
}

impl SimpleRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_route_name(mut self, name: impl Into<String>) -> Self {
        self.route_name = Some(name.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.content_type = Some("application/json".to_string());
        self.body = Payload::Json(body);
        self
    }
}

impl RequestAdapter for SimpleRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    fn path_params(&self) -> Option<HashMap<String, String>> {
        self.path_params.clone()
    }

    fn query(&self) -> Vec<(String, String)> {
        self.query.clone()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn form(&self) -> Vec<(String, String)> {
        self.form.clone()
    }

    fn body(&self) -> Payload {
        self.body.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimpleResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Payload,
}

impl SimpleResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            headers: Vec::new(),
            body: Payload::Json(body),
        }
    }

    pub fn text(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(content_type.into()),
            headers: Vec::new(),
            body: Payload::Text(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl ResponseAdapter for SimpleResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn body(&self) -> Payload {
        self.body.clone()
    }
}
