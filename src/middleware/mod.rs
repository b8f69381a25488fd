pub mod admission;
pub mod auth;
pub mod extract;
pub mod response;
pub mod roles;

pub use admission::admission_middleware;
pub use auth::jwt_auth_middleware;
pub use extract::{JsonBody, PathId, PathIds, QueryParams};
pub use response::{ApiResponse, ApiResult};
pub use roles::require_roles;
