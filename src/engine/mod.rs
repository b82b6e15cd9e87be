//! Template calculation engine
//!
//! - [`tokenizer`] - reads attribute values out of an order string
//! - [`resolver`] - resolves cells and renders display fields
//! - [`prune`] - selects the relation and prunes the node tree
//! - [`calculate`] - sequences the passes into one calculation

pub mod calculate;
pub mod context;
pub mod csv_tables;
pub mod error;
pub mod expr;
pub mod functions;
pub mod lookup;
pub mod patterns;
pub mod prune;
pub mod resolver;
pub mod tokenizer;

pub use calculate::{Calculation, Calculator};
pub use context::{CalcContext, CellPool, Limits};
pub use csv_tables::CsvTables;
pub use error::CalcError;
pub use functions::{Function, FunctionHost, NullHost};
pub use lookup::{LookupError, LookupRequest, NoTables, StaticTables, TableLookup};
pub use patterns::CompiledPatterns;
pub use tokenizer::{tokenize, Marking};
