pub mod loader;
pub mod registry;
pub mod settings;
pub mod types;
pub mod validator;

pub use loader::*;
pub use registry::*;
pub use settings::*;
pub use types::*;
pub use validator::*;
