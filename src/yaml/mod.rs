//! YAML diagnostics

pub mod diagnostics;

pub use diagnostics::YamlSyntaxError;
