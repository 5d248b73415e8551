//! Naming strategies: key casing and English inflection.

mod case;
mod inflector;

pub use case::{to_camel_case, to_kebab_case, to_snake_case, KeyCase};
pub use inflector::{English, Inflector};
