pub mod common;
pub mod crud;
pub use common::common_routes;
pub use crud::{crud_routes, crud_routes_with_limit, DEFAULT_BODY_LIMIT};
