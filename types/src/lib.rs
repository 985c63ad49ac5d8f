pub mod admin;
pub mod api;
pub use api::{
    ApiResponse, MessageResponse, MessageWithData, PageQuery, PagedResponse, Pagination,
    StorageAction, StorageRequest,
};
pub mod keys;
pub use keys::{sanitize_key, Allowlist};
pub mod model;
