use crate::adapter::{Payload, ResponseAdapter};
use crate::error::{SpecError, ValidationError};
use crate::validation_helpers::{build_validator, collect_violations};
use crate::validators::section::SectionValidator;
use crate::violation::{Violation, ViolationKind};
use indexmap::IndexMap;
use jsonschema::{Registry, Validator};
use serde_json::Value;
use std::fmt;

/// Body expected for one declared response.
pub enum ResponseBody {
    /// No schema: the body must be absent or empty.
    Void,
    Schema { schema: Value, validator: Validator },
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("Void"),
            Self::Schema { schema, .. } => f.debug_tuple("Schema").field(schema).finish(),
        }
    }
}

#[derive(Debug)]
pub struct ResponseSpec {
    body: ResponseBody,
    headers: Option<SectionValidator>,
}

impl ResponseSpec {
    pub fn void() -> Self {
        Self {
            body: ResponseBody::Void,
            headers: None,
        }
    }

    pub fn with_schema(schema: Value, registry: &Registry, error_context: &str) -> Result<Self, SpecError> {
        let validator = build_validator(&schema, registry, error_context)?;
        Ok(Self {
            body: ResponseBody::Schema { schema, validator },
            headers: None,
        })
    }

    pub fn with_headers(mut self, headers: SectionValidator) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn is_void(&self) -> bool {
        matches!(self.body, ResponseBody::Void)
    }

    fn validate<R: ResponseAdapter + ?Sized>(&self, response: &R) -> Vec<Violation> {
        let mut violations = Vec::new();
        let payload = response.body();
        match &self.body {
            ResponseBody::Void => {
                if !payload.is_void() {
                    let actual = payload.to_json().unwrap_or(Value::Null);
                    violations.push(
                        Violation::new(
                            ViolationKind::BodyNotEmpty,
                            "body",
                            "response declares no body but one was returned",
                        )
                        .with_actual(actual),
                    );
                }
            }
            ResponseBody::Schema { validator, .. } => match &payload {
                Payload::Json(value) => violations.extend(collect_violations(validator, value, "body")),
                Payload::Text(text) if is_json(response.content_type()) => {
                    match serde_json::from_str::<Value>(text) {
                        Ok(value) => violations.extend(collect_violations(validator, &value, "body")),
                        Err(e) => violations.push(
                            Violation::new(ViolationKind::Constraint, "body", format!("invalid JSON: {}", e))
                                .with_actual(Value::String(text.clone())),
                        ),
                    }
                }
                // Non-JSON representations are not schema-checked.
                Payload::Text(_) => {}
                Payload::Empty => violations.extend(collect_violations(validator, &Value::Null, "body")),
            },
        }
        if let Some(headers) = &self.headers {
            let cast = headers.cast(&response.headers());
            if let Err(errors) = headers.validate(&cast) {
                violations.extend(errors);
            }
        }
        violations
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .map(media_type)
        .map(|media| media == "application/json" || media.ends_with("+json"))
        .unwrap_or(true)
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Declared responses of one operation.
#[derive(Debug, Default)]
pub struct ResponseValidator {
    exact: IndexMap<u16, ResponseSpec>,
    default: Option<ResponseSpec>,
    produces: Vec<String>,
}

impl ResponseValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&mut self, status: u16, spec: ResponseSpec) {
        self.exact.insert(status, spec);
    }

    pub fn set_default(&mut self, spec: ResponseSpec) {
        self.default = Some(spec);
    }

    pub fn set_produces(&mut self, produces: Vec<String>) {
        self.produces = produces;
    }

    pub fn produces(&self) -> &[String] {
        &self.produces
    }

    /// Spec applying to `status`: exact first, then `default` for 2xx statuses.
    /// Other undeclared statuses have no spec and are not validated.
    pub fn spec_for(&self, status: u16) -> Option<&ResponseSpec> {
        match self.exact.get(&status) {
            Some(spec) => Some(spec),
            None if is_success(status) => self.default.as_ref(),
            None => None,
        }
    }

    pub fn statuses(&self) -> impl Iterator<Item = &u16> {
        self.exact.keys()
    }

    pub fn validate<R: ResponseAdapter + ?Sized>(&self, response: &R) -> Result<(), ValidationError> {
        let status = response.status();
        let fail = |violations: Vec<Violation>| ValidationError::ResponseInvalid { status, violations };

        let spec = match self.spec_for(status) {
            Some(spec) => spec,
            None if is_success(status) => {
                return Err(fail(vec![Violation::new(
                    ViolationKind::UndeclaredStatus,
                    "status",
                    format!("no response declared for status {}", status),
                )
                .with_actual(Value::from(status))]))
            }
            None => {
                tracing::trace!(status, "skipping validation of undeclared status");
                return Ok(());
            }
        };

        let mut violations = Vec::new();
        if !self.produces.is_empty() && !response.body().is_empty() {
            if let Some(content_type) = response.content_type() {
                let media = media_type(content_type);
                if !self.produces.iter().any(|p| media_type(p) == media) {
                    violations.push(
                        Violation::new(
                            ViolationKind::ContentTypeNotAllowed,
                            "content-type",
                            format!("content type not in produces: {}", self.produces.join(", ")),
                        )
                        .with_actual(Value::String(content_type.to_string())),
                    );
                }
            }
        }
        violations.extend(spec.validate(response));

        if violations.is_empty() {
            Ok(())
        } else {
            Err(fail(violations))
        }
    }
}
