//! Response envelope, pagination and request extractors

pub mod extract;
pub mod pagination;
pub mod response;

pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use pagination::PaginationParams;
pub use response::{ApiResponse, Created};
