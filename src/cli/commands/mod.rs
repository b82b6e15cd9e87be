//! CLI command implementations

pub mod calc;
pub mod completions;
pub mod eval;
pub mod tokenize;
pub mod validate;
