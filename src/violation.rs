use jsonschema::error::ValidationErrorKind;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    TypeMismatch,
    MissingRequired,
    EnumViolation,
    OneOfNoMatch,
    AnyOfNoMatch,
    UnexpectedProperty,
    Constraint,
    BodyNotEmpty,
    ContentTypeNotAllowed,
    UndeclaredStatus,
    MissingCredentials,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::MissingRequired => "MISSING_REQUIRED",
            Self::EnumViolation => "ENUM_VIOLATION",
            Self::OneOfNoMatch => "ONEOF_NO_MATCH",
            Self::AnyOfNoMatch => "ANYOF_NO_MATCH",
            Self::UnexpectedProperty => "UNEXPECTED_PROPERTY",
            Self::Constraint => "CONSTRAINT_VIOLATION",
            Self::BodyNotEmpty => "BODY_NOT_EMPTY",
            Self::ContentTypeNotAllowed => "CONTENT_TYPE_NOT_ALLOWED",
            Self::UndeclaredStatus => "UNDECLARED_STATUS",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
        }
    }
}

/// Maps a JSON Schema error kind to the violation reported to callers.
pub fn map_violation_kind(kind: &ValidationErrorKind) -> ViolationKind {
    match kind {
        ValidationErrorKind::Type { .. } => ViolationKind::TypeMismatch,
        ValidationErrorKind::Required { .. } => ViolationKind::MissingRequired,
        ValidationErrorKind::Enum { .. } => ViolationKind::EnumViolation,
        ValidationErrorKind::OneOfNotValid { .. } => ViolationKind::OneOfNoMatch,
        ValidationErrorKind::AnyOf { .. } => ViolationKind::AnyOfNoMatch,
        ValidationErrorKind::AdditionalProperties { .. } => ViolationKind::UnexpectedProperty,
        _ => ViolationKind::Constraint,
    }
}

/// One failed constraint: where it failed, what kind of failure, and the
/// offending value when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub location: String,
    pub message: String,
    pub actual: Option<Value>,
}

impl Violation {
    pub fn new(kind: ViolationKind, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
            actual: None,
        }
    }

    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual = Some(actual);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] at {} - {}", self.kind.as_str(), self.location, self.message)
    }
}
