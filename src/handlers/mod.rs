//! HTTP handlers for document CRUD.

pub mod crud;
pub use crud::*;
