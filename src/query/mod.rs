//! Filter expressions and list-query composition.

mod composer;
mod filter;
pub use composer::*;
pub use filter::*;
