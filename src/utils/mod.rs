pub mod template;

pub use template::{key_template, ID_PLACEHOLDER};
