//! Generic CRUD controller and its customization hooks.

mod crud;
mod hooks;
mod validation;
pub use crud::{CrudController, Intent, ListParams, ListResponse, DEFAULT_LIMIT, DEFAULT_PAGE};
pub use hooks::{CrudHooks, NoHooks, RequestContext};
pub use validation::DocumentValidator;
