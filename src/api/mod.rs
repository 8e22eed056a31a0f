//! API response types, pagination and request extractors

pub mod pagination;
pub mod query;
pub mod response;
pub mod validated_json;

pub use pagination::{Paginated, PaginationParams};
pub use query::ensure_range;
pub use response::{Created, DataResponse, NoContent};
pub use validated_json::ValidateJson;
