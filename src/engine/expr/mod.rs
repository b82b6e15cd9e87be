//! Formula expressions: lexing, parsing and evaluation
//!
//! Evaluation is lenient by contract: callers fall back to the original text
//! on any [`ExprError`] except [`ExprError::Host`], which carries a failure
//! that must abort the calculation (table lookups, reference cycles).

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

use thiserror::Error;

use crate::engine::error::CalcError;
use crate::engine::functions::{Function, FunctionHost};

pub use lexer::{lex, Token};
pub use parser::{parse, BinaryOp, Expr, UnaryOp};
pub use value::{format_number, is_numeric, parse_number, split_range, Value, EMPTY_LITERAL};

/// Errors raised while evaluating a single expression
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("lex error at {position}: {message}")]
    Lex { position: usize, message: String },

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unresolved placeholder [{0}]")]
    UnresolvedPlaceholder(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}() expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("math error: {0}")]
    Math(String),

    /// Failure raised by the function host; never recovered locally
    #[error(transparent)]
    Host(Box<CalcError>),
}

impl ExprError {
    pub(crate) fn lex(position: usize, message: impl Into<String>) -> Self {
        ExprError::Lex {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn arity(function: &str, expected: impl Into<String>, found: usize) -> Self {
        ExprError::Arity {
            function: function.to_string(),
            expected: expected.into(),
            found,
        }
    }
}

impl From<CalcError> for ExprError {
    fn from(err: CalcError) -> Self {
        ExprError::Host(Box::new(err))
    }
}

/// Lex, parse and evaluate `text`
pub fn evaluate(text: &str, host: &mut dyn FunctionHost) -> Result<Value, ExprError> {
    let tokens = lex(text)?;
    let expr = parse(&tokens)?;
    eval::eval(&expr, host)
}

/// Whether `text` contains an operator, parenthesis or ternary part and is
/// therefore worth evaluating; plain literals pass through unevaluated
pub fn needs_evaluation(text: &str) -> bool {
    match lex(text) {
        Ok(tokens) => tokens.iter().any(Token::is_operator),
        Err(_) => text.chars().any(|c| "+-*/%<>=!&|()?:,;".contains(c)),
    }
}

/// Whether `text` uses the ternary keywords (if/then/else, `?`, `:`)
pub fn has_ternary(text: &str) -> bool {
    match lex(text) {
        Ok(tokens) => tokens.iter().any(Token::is_ternary),
        Err(_) => text.contains('?'),
    }
}

/// Whether authored text is written as a formula: it has a string literal,
/// a call to a known function or a ternary part
pub fn is_formula(text: &str) -> bool {
    let Ok(tokens) = lex(text) else {
        return false;
    };
    tokens.iter().enumerate().any(|(i, token)| match token {
        Token::Str(_) => true,
        Token::Ident(name) => {
            Function::from_name(name).is_some() && tokens.get(i + 1) == Some(&Token::LParen)
        }
        other => other.is_ternary(),
    })
}
