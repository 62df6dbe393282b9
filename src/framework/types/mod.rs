//! Custom attribute value types.

mod json_obfuscatable;
mod resource_id;

pub use json_obfuscatable::*;
pub use resource_id::*;
