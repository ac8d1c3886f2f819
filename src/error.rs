use crate::violation::Violation;
use std::fmt;
use thiserror::Error;

/// Errors raised while ingesting a spec. All of them are fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    #[error("Failed to load spec document {location}: {message}")]
    SpecLoad { location: String, message: String },

    #[error("Invalid reference target '{target}': {reason}{}", format_chain(.chain))]
    InvalidReferenceTarget {
        target: String,
        reason: String,
        chain: Vec<String>,
    },

    #[error("Swagger spec is invalid: {0}")]
    SwaggerSpecInvalid(String),

    #[error("Failed to compile JSON schema: {0}")]
    SchemaCompilation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SpecError {
    pub(crate) fn invalid_target(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReferenceTarget {
            target: target.into(),
            reason: reason.into(),
            chain: Vec::new(),
        }
    }

    pub(crate) fn load(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::SpecLoad {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    /// Attaches the `$ref` chain that led to a reference failure.
    pub(crate) fn with_chain(self, refs: &[String]) -> Self {
        match self {
            Self::InvalidReferenceTarget {
                target,
                reason,
                chain,
            } if chain.is_empty() => Self::InvalidReferenceTarget {
                target,
                reason,
                chain: refs.to_vec(),
            },
            other => other,
        }
    }
}

fn format_chain(chain: &[String]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (via {})", chain.join(" -> "))
    }
}

/// Request section a validator is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Query,
    Path,
    Header,
    Form,
    Body,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Form => "form",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating a single request/response pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Could not find a matching Swagger operation for {method} request {path}")]
    PathNotMatched { method: String, path: String },

    #[error("Request {section} is invalid: {}", format_violations(.violations))]
    RequestInvalid {
        section: Section,
        violations: Vec<Violation>,
    },

    #[error("Request is not authenticated: {}", format_violations(.violations))]
    Unauthenticated { violations: Vec<Violation> },

    #[error("Response with status {status} is invalid: {}", format_violations(.violations))]
    ResponseInvalid {
        status: u16,
        violations: Vec<Violation>,
    },
}

impl ValidationError {
    /// Conventional HTTP status for rendering this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PathNotMatched { .. } => 404,
            Self::RequestInvalid { .. } => 400,
            Self::Unauthenticated { .. } => 401,
            Self::ResponseInvalid { .. } => 500,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::PathNotMatched { .. } => &[],
            Self::RequestInvalid { violations, .. }
            | Self::Unauthenticated { violations }
            | Self::ResponseInvalid { violations, .. } => violations,
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
