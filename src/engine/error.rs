//! Calculation errors

use miette::Diagnostic;
use thiserror::Error;

use crate::engine::lookup::LookupError;

/// Failures that abort a calculation
#[derive(Debug, Error, Diagnostic)]
pub enum CalcError {
    #[error("order/branch not recognized: no marking example matches '{marking}'")]
    #[diagnostic(
        code(bomcalc::calc::marking),
        help("check the order string, or add a matching example to the template's markings")
    )]
    MarkingNotRecognized { marking: String },

    #[error("order/branch not recognized: unknown branch '{branch}'")]
    #[diagnostic(code(bomcalc::calc::branch), help("known branches: {known}"))]
    BranchNotRecognized { branch: String, known: String },

    #[error("circular reference: {}", path.join(" -> "))]
    #[diagnostic(
        code(bomcalc::calc::cycle),
        help("break the loop in the cells' parts lists or bracketed names")
    )]
    Cycle { path: Vec<String> },

    #[error(transparent)]
    #[diagnostic(code(bomcalc::calc::lookup))]
    Lookup(#[from] LookupError),

    #[error("invalid pattern '{pattern}' in group '{group}'")]
    #[diagnostic(code(bomcalc::calc::pattern))]
    InvalidPattern {
        group: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl CalcError {
    pub fn is_not_recognized(&self) -> bool {
        matches!(
            self,
            CalcError::MarkingNotRecognized { .. } | CalcError::BranchNotRecognized { .. }
        )
    }
}
