//! Per-request validation flow.
//!
//! ```text
//! Received -> Matched -> RequestValidated -> Handled -> ResponseValidated -> Complete
//!    |           |              |                              |
//!    +-> Excluded +-> Failed     +-> Failed                     +-> Failed
//! ```

use crate::adapter::{RequestAdapter, ResponseAdapter};
use crate::config::ValidationSettings;
use crate::error::{Section, ValidationError};
use crate::operation_index::{HttpMethod, MatchResult, OperationDescriptor};
use crate::path_matcher::extract_path_params;
use crate::swagger_spec::SwaggerSpec;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PathNotMatched,
    RequestInvalid,
    Unauthenticated,
    ResponseInvalid,
}

impl FailureKind {
    fn of(error: &ValidationError) -> Self {
        match error {
            ValidationError::PathNotMatched { .. } => Self::PathNotMatched,
            ValidationError::RequestInvalid { .. } => Self::RequestInvalid,
            ValidationError::Unauthenticated { .. } => Self::Unauthenticated,
            ValidationError::ResponseInvalid { .. } => Self::ResponseInvalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Matched,
    RequestValidated,
    Handled,
    ResponseValidated,
    Complete,
    Excluded,
    Failed(FailureKind),
}

/// Cast and validated request data handed to the handler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedRequest {
    pub query: Map<String, Value>,
    pub path: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub form: Map<String, Value>,
    pub body: Option<(String, Value)>,
}

impl ValidatedRequest {
    /// All sections merged into one map; later sections win on name clashes
    /// and the body is stored under its parameter name.
    pub fn swagger_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        for section in [&self.query, &self.path, &self.headers, &self.form] {
            for (name, value) in section {
                data.insert(name.clone(), value.clone());
            }
        }
        if let Some((name, value)) = &self.body {
            data.insert(name.clone(), value.clone());
        }
        data
    }

    fn section_mut(&mut self, section: Section) -> &mut Map<String, Value> {
        match section {
            Section::Query => &mut self.query,
            Section::Path => &mut self.path,
            Section::Header => &mut self.headers,
            Section::Form | Section::Body => &mut self.form,
        }
    }
}

/// Hook turning a validation failure into the error reported to the caller.
pub trait ErrorWrapper: Send + Sync {
    fn wrap(
        &self,
        error: ValidationError,
        request: &dyn RequestAdapter,
        response: Option<&dyn ResponseAdapter>,
    ) -> ValidationError;
}

/// Reports failures unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityWrapper;

impl ErrorWrapper for IdentityWrapper {
    fn wrap(
        &self,
        error: ValidationError,
        _request: &dyn RequestAdapter,
        _response: Option<&dyn ResponseAdapter>,
    ) -> ValidationError {
        error
    }
}

type ExclusionHook = Box<dyn Fn(&dyn RequestAdapter) -> bool + Send + Sync>;

/// Result of one dispatch together with the states it went through.
#[derive(Debug)]
pub struct Outcome<R> {
    pub states: Vec<DispatchState>,
    pub result: Result<R, ValidationError>,
}

impl<R> Outcome<R> {
    pub fn final_state(&self) -> DispatchState {
        self.states.last().copied().unwrap_or(DispatchState::Received)
    }
}

pub struct Dispatcher {
    spec: Arc<SwaggerSpec>,
    settings: ValidationSettings,
    error_wrapper: Box<dyn ErrorWrapper>,
    exclusion: Option<ExclusionHook>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("operations", &self.spec.index().len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(spec: Arc<SwaggerSpec>, settings: ValidationSettings) -> Self {
        Self {
            spec,
            settings,
            error_wrapper: Box::new(IdentityWrapper),
            exclusion: None,
        }
    }

    pub fn with_error_wrapper(mut self, wrapper: impl ErrorWrapper + 'static) -> Self {
        self.error_wrapper = Box::new(wrapper);
        self
    }

    /// Extra exclusion rule checked after the configured ones.
    pub fn with_exclusion(
        mut self,
        hook: impl Fn(&dyn RequestAdapter) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.exclusion = Some(Box::new(hook));
        self
    }

    pub fn spec(&self) -> &SwaggerSpec {
        &self.spec
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    pub fn should_exclude(&self, request: &dyn RequestAdapter) -> bool {
        self.settings.all_disabled()
            || self.settings.is_path_excluded(request.path())
            || self.settings.is_route_excluded(request.route_name())
            || self.exclusion.as_ref().is_some_and(|hook| hook(request))
    }

    /// `Ok(None)` means the path is unknown but path validation is off.
    pub fn match_request(
        &self,
        request: &dyn RequestAdapter,
    ) -> Result<Option<&OperationDescriptor>, ValidationError> {
        let found = HttpMethod::from_str(request.method())
            .ok()
            .map(|method| self.spec.index().find_operation(request.path(), method));
        match found {
            Some(MatchResult::Matched(operation)) => Ok(Some(operation)),
            Some(MatchResult::Unmatched) | None if !self.settings.validate_path => {
                tracing::debug!(path = request.path(), "unmatched request passed through");
                Ok(None)
            }
            _ => Err(ValidationError::PathNotMatched {
                method: request.method().to_uppercase(),
                path: request.path().to_string(),
            }),
        }
    }

    /// Checks credentials, then casts and validates every request section in
    /// order; the first failing section aborts.
    pub fn validate_request(
        &self,
        operation: &OperationDescriptor,
        request: &dyn RequestAdapter,
    ) -> Result<ValidatedRequest, ValidationError> {
        operation
            .security
            .validate(&request.query(), &request.headers())
            .map_err(|violations| ValidationError::Unauthenticated { violations })?;

        let path_params: Vec<(String, String)> = request
            .path_params()
            .or_else(|| extract_path_params(&operation.templated_path, request.path()))
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut validated = ValidatedRequest::default();
        for (section, raw) in [
            (Section::Query, request.query()),
            (Section::Path, path_params),
            (Section::Header, request.headers()),
            (Section::Form, request.form()),
        ] {
            let Some(validator) = operation.section(section) else {
                continue;
            };
            let cast = validator.cast(&raw);
            validator
                .validate(&cast)
                .map_err(|violations| ValidationError::RequestInvalid { section, violations })?;
            if let Value::Object(map) = cast {
                *validated.section_mut(section) = map;
            }
        }

        let body = operation
            .body
            .validate(&request.body())
            .map_err(|violations| ValidationError::RequestInvalid {
                section: Section::Body,
                violations,
            })?;
        validated.body = body.map(|value| (operation.body.name().to_string(), value));
        Ok(validated)
    }

    pub fn validate_response(
        &self,
        operation: &OperationDescriptor,
        response: &dyn ResponseAdapter,
    ) -> Result<(), ValidationError> {
        operation.responses.validate(response)
    }

    /// Runs `handler` for `request` with validation around it.
    ///
    /// The handler receives the validated data, or `None` when the request
    /// was excluded, passed through unmatched, or request validation is off.
    pub fn dispatch<Req, Resp, H>(&self, request: &Req, handler: H) -> Outcome<Resp>
    where
        Req: RequestAdapter,
        Resp: ResponseAdapter,
        H: FnOnce(&Req, Option<&ValidatedRequest>) -> Resp,
    {
        let mut states = vec![DispatchState::Received];
        let fail = |states: &mut Vec<DispatchState>, error: ValidationError, response: Option<&dyn ResponseAdapter>| {
            states.push(DispatchState::Failed(FailureKind::of(&error)));
            Err(self.error_wrapper.wrap(error, request, response))
        };

        if self.should_exclude(request) {
            tracing::trace!(path = request.path(), "request excluded from validation");
            states.push(DispatchState::Excluded);
            let response = handler(request, None);
            return Outcome {
                states,
                result: Ok(response),
            };
        }

        let operation = match self.match_request(request) {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                states.push(DispatchState::Excluded);
                let response = handler(request, None);
                return Outcome {
                    states,
                    result: Ok(response),
                };
            }
            Err(error) => {
                let result = fail(&mut states, error, None);
                return Outcome { states, result };
            }
        };
        states.push(DispatchState::Matched);

        let validated = if self.settings.validate_request {
            match self.validate_request(operation, request) {
                Ok(validated) => {
                    states.push(DispatchState::RequestValidated);
                    Some(validated)
                }
                Err(error) => {
                    let result = fail(&mut states, error, None);
                    return Outcome { states, result };
                }
            }
        } else {
            None
        };

        let response = handler(request, validated.as_ref());
        states.push(DispatchState::Handled);

        if self.settings.validate_response {
            if let Err(error) = self.validate_response(operation, &response) {
                let result = fail(&mut states, error, Some(&response));
                return Outcome { states, result };
            }
            states.push(DispatchState::ResponseValidated);
        }
        states.push(DispatchState::Complete);
        Outcome {
            states,
            result: Ok(response),
        }
    }
}
