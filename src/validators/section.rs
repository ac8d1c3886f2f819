use crate::adapter::Payload;
use crate::error::{Section, SpecError};
use crate::validation_helpers::{build_validator, collect_violations};
use crate::validators::cast::{cast_primitive, CollectionFormat};
use crate::violation::{Violation, ViolationKind};
use jsonschema::{Registry, Validator};
use serde_json::{Map, Value};
use std::fmt;

/// What casting needs to know about one declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: Option<String>,
    pub items_type: Option<String>,
    pub collection_format: CollectionFormat,
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// Reads the casting hints from a parameter-like object (a Swagger 2.0
    /// parameter, or the `schema` of an OpenAPI 3 one).
    pub fn from_schema(name: impl Into<String>, schema: &Value, format: CollectionFormat) -> Self {
        let string_at = |key: &str| schema.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: name.into(),
            param_type: string_at("type"),
            items_type: schema
                .get("items")
                .and_then(|items| items.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string),
            collection_format: format,
            default: schema.get("default").cloned(),
        }
    }

    fn cast(&self, values: &[String]) -> Value {
        if self.param_type.as_deref() == Some("array") {
            let items = self
                .collection_format
                .split(values)
                .iter()
                .map(|item| cast_primitive(self.items_type.as_deref(), item))
                .collect();
            return Value::Array(items);
        }
        match values {
            [single] => cast_primitive(self.param_type.as_deref(), single),
            several => Value::Array(
                several
                    .iter()
                    .map(|value| cast_primitive(self.param_type.as_deref(), value))
                    .collect(),
            ),
        }
    }
}

/// Validator bound to one request section. Without a schema it accepts anything.
pub struct SectionValidator {
    section: Section,
    parameters: Vec<ParameterSpec>,
    schema: Option<Value>,
    validator: Option<Validator>,
}

impl fmt::Debug for SectionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionValidator")
            .field("section", &self.section)
            .field("parameters", &self.parameters)
            .field("schema", &self.schema)
            .finish()
    }
}

impl SectionValidator {
    pub fn new(
        section: Section,
        parameters: Vec<ParameterSpec>,
        schema: Option<Value>,
        registry: &Registry,
        error_context: &str,
    ) -> Result<Self, SpecError> {
        let validator = schema
            .as_ref()
            .map(|schema| build_validator(schema, registry, error_context))
            .transpose()?;
        Ok(Self {
            section,
            parameters,
            schema,
            validator,
        })
    }

    pub fn empty(section: Section) -> Self {
        Self {
            section,
            parameters: Vec::new(),
            schema: None,
            validator: None,
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Builds the object this section is validated as, casting each declared
    /// parameter. Undeclared raw values are kept as strings.
    pub fn cast(&self, raw: &[(String, String)]) -> Value {
        let case_insensitive = self.section == Section::Header;
        let same_name = |a: &str, b: &str| {
            if case_insensitive {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };

        let mut object = Map::new();
        for parameter in &self.parameters {
            let values: Vec<String> = raw
                .iter()
                .filter(|(name, _)| same_name(name, &parameter.name))
                .map(|(_, value)| value.clone())
                .collect();
            if values.is_empty() {
                if let Some(default) = &parameter.default {
                    object.insert(parameter.name.clone(), default.clone());
                }
                continue;
            }
            object.insert(parameter.name.clone(), parameter.cast(&values));
        }

        for (name, value) in raw {
            let declared = self.parameters.iter().any(|p| same_name(name, &p.name));
            if declared || object.contains_key(name) {
                continue;
            }
            let all: Vec<&(String, String)> = raw.iter().filter(|(n, _)| n == name).collect();
            let value = if all.len() > 1 {
                Value::Array(all.iter().map(|(_, v)| Value::String(v.clone())).collect())
            } else {
                Value::String(value.clone())
            };
            object.insert(name.clone(), value);
        }
        Value::Object(object)
    }

    pub fn validate(&self, instance: &Value) -> Result<(), Vec<Violation>> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        if validator.is_valid(instance) {
            return Ok(());
        }
        Err(collect_violations(validator, instance, self.section.as_str()))
    }
}

/// Validator for the single `in: body` parameter (or OpenAPI 3 request body).
#[derive(Debug)]
pub struct BodyValidator {
    name: String,
    required: bool,
    inner: SectionValidator,
}

impl BodyValidator {
    pub fn new(
        name: impl Into<String>,
        required: bool,
        schema: Option<Value>,
        registry: &Registry,
    ) -> Result<Self, SpecError> {
        let name = name.into();
        let inner = SectionValidator::new(
            Section::Body,
            Vec::new(),
            schema,
            registry,
            &format!("body parameter '{}'", name),
        )?;
        Ok(Self {
            name,
            required,
            inner,
        })
    }

    pub fn absent() -> Self {
        Self {
            name: "body".to_string(),
            required: false,
            inner: SectionValidator::empty(Section::Body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn schema(&self) -> Option<&Value> {
        self.inner.schema()
    }

    /// Validates the decoded payload as is; returns it for the handler.
    pub fn validate(&self, payload: &Payload) -> Result<Option<Value>, Vec<Violation>> {
        match payload.to_json() {
            None if self.required => Err(vec![Violation::new(
                ViolationKind::MissingRequired,
                "body",
                format!("{} is required", self.name),
            )]),
            None => Ok(None),
            Some(value) => {
                self.inner.validate(&value)?;
                Ok(Some(value))
            }
        }
    }
}
