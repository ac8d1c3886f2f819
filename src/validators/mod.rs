pub mod cast;
pub mod response;
pub mod section;
pub mod security;

pub use cast::{cast_primitive, CollectionFormat};
pub use response::{ResponseBody, ResponseSpec, ResponseValidator};
pub use section::{BodyValidator, ParameterSpec, SectionValidator};
pub use security::{Credential, SecurityRequirement, SecurityValidator};
