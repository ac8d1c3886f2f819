pub mod adapter;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod operation_index;
pub mod path_matcher;
pub mod spec;
pub mod swagger_spec;
pub mod validation_helpers;
pub mod validators;
pub mod violation;

pub use adapter::{Payload, RequestAdapter, ResponseAdapter, SimpleRequest, SimpleResponse};
pub use config::{ValidationConfig, ValidationSettings};
pub use dispatcher::{
    DispatchState, Dispatcher, ErrorWrapper, FailureKind, IdentityWrapper, Outcome, ValidatedRequest,
};
pub use error::{Section, SpecError, ValidationError};
pub use operation_index::{HttpMethod, MatchResult, OperationDescriptor, OperationIndex};
pub use path_matcher::{extract_path_params, partial_path_match};
pub use spec::{
    build_operation_index, collect_ref_files, load_spec_document, marshal_target, resolve,
    rewrite_ref_extensions, unmarshal_target, DocumentLoader, DocumentStore, FileLoader,
    MemoryLoader, ResolveMode, SchemaFormat, SpecDocument,
};
pub use swagger_spec::SwaggerSpec;
pub use validation_helpers::{build_registry, build_validator, format_instance_location};
pub use validators::{ResponseValidator, SectionValidator, SecurityValidator};
pub use violation::{Violation, ViolationKind};
