pub mod builder;
pub mod document;
pub mod loader;
pub mod meta_schema;
pub mod reference;
pub mod reference_resolver;
pub mod walker;

pub use builder::build_operation_index;
pub use document::{DocumentLoader, DocumentStore, FileLoader, MemoryLoader, SchemaFormat, SpecDocument};
pub use loader::load_spec_document;
pub use meta_schema::validate_spec_structure;
pub use reference::{marshal_target, unmarshal_target, MarshalTarget, RefTarget, ReferenceKind};
pub use reference_resolver::{
    collect_ref_files, resolve, rewrite_ref_extensions, ResolveMode, ResolveReference,
};
pub use walker::{Context, Dialect, RefHandler};
