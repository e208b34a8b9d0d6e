//! Configuration module.

mod loader;
mod properties;
mod types;

pub use loader::*;
pub use properties::*;
pub use types::*;
