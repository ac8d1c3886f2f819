use crate::error::{Section, ValidationError};
use crate::path_matcher::partial_path_match;
use crate::validators::{BodyValidator, ResponseValidator, SectionValidator, SecurityValidator};
use std::fmt;
use std::str::FromStr;

/// HTTP methods an operation can be declared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    PUT,
    POST,
    DELETE,
    OPTIONS,
    HEAD,
    PATCH,
    TRACE,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GET => "GET",
            Self::PUT => "PUT",
            Self::POST => "POST",
            Self::DELETE => "DELETE",
            Self::OPTIONS => "OPTIONS",
            Self::HEAD => "HEAD",
            Self::PATCH => "PATCH",
            Self::TRACE => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::GET),
            "PUT" => Ok(Self::PUT),
            "POST" => Ok(Self::POST),
            "DELETE" => Ok(Self::DELETE),
            "OPTIONS" => Ok(Self::OPTIONS),
            "HEAD" => Ok(Self::HEAD),
            "PATCH" => Ok(Self::PATCH),
            "TRACE" => Ok(Self::TRACE),
            _ => Err(()),
        }
    }
}

/// Everything needed to validate traffic for one (path template, method).
#[derive(Debug)]
pub struct OperationDescriptor {
    pub templated_path: String,
    pub http_method: HttpMethod,
    pub operation_id: Option<String>,
    pub security: SecurityValidator,
    pub query: SectionValidator,
    pub path: SectionValidator,
    pub header: SectionValidator,
    pub form: SectionValidator,
    pub body: BodyValidator,
    pub responses: ResponseValidator,
}

impl OperationDescriptor {
    pub fn new(templated_path: impl Into<String>, http_method: HttpMethod) -> Self {
        Self {
            templated_path: templated_path.into(),
            http_method,
            operation_id: None,
            security: SecurityValidator::none(),
            query: SectionValidator::empty(Section::Query),
            path: SectionValidator::empty(Section::Path),
            header: SectionValidator::empty(Section::Header),
            form: SectionValidator::empty(Section::Form),
            body: BodyValidator::absent(),
            responses: ResponseValidator::new(),
        }
    }

    pub fn section(&self, section: Section) -> Option<&SectionValidator> {
        match section {
            Section::Query => Some(&self.query),
            Section::Path => Some(&self.path),
            Section::Header => Some(&self.header),
            Section::Form => Some(&self.form),
            Section::Body => None,
        }
    }

    pub fn matches(&self, path: &str, method: HttpMethod) -> bool {
        self.http_method == method && partial_path_match(&self.templated_path, path)
    }
}

pub enum MatchResult<'a> {
    Matched(&'a OperationDescriptor),
    Unmatched,
}

/// Operations in declaration order; lookup is first-match-wins.
#[derive(Debug, Default)]
pub struct OperationIndex {
    operations: Vec<OperationDescriptor>,
}

impl OperationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: OperationDescriptor) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter()
    }

    pub fn find_operation(&self, path: &str, method: HttpMethod) -> MatchResult<'_> {
        self.operations
            .iter()
            .find(|operation| operation.matches(path, method))
            .map_or(MatchResult::Unmatched, MatchResult::Matched)
    }

    /// Like [`find_operation`](Self::find_operation), for callers that treat a
    /// miss as a failure. `method` is taken raw so unknown verbs also miss.
    pub fn find_operation_or_err(
        &self,
        path: &str,
        method: &str,
    ) -> Result<&OperationDescriptor, ValidationError> {
        let not_found = || ValidationError::PathNotMatched {
            method: method.to_uppercase(),
            path: path.to_string(),
        };
        let method = HttpMethod::from_str(method).map_err(|_| not_found())?;
        match self.find_operation(path, method) {
            MatchResult::Matched(operation) => Ok(operation),
            MatchResult::Unmatched => Err(not_found()),
        }
    }
}
