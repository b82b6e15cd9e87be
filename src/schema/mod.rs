//! Template file validation: embedded JSON schema plus structural checks

pub mod registry;
pub mod structure;
pub mod validator;

pub use registry::SchemaRegistry;
pub use structure::{check_structure, Severity, StructureIssue};
pub use validator::{ValidationError, Validator};
