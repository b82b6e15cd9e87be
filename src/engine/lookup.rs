//! Table lookup collaborator
//!
//! The engine never reads spreadsheets itself; `lookup(...)` calls in formula
//! text are forwarded to a [`TableLookup`] supplied by the caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::expr::{parse_number, split_range};

/// Arguments of one `lookup(...)` call, already resolved to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub table: String,
    pub sheet: String,
    pub row: String,
    pub column: String,
    /// Extra positional filter values, matched after the row key
    pub filters: Vec<String>,
    /// Range match on the row key instead of exact match
    pub range: bool,
}

/// Errors raised by lookup argument checks and collaborators
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no tables configured for lookup")]
    NotConfigured,

    #[error("missing lookup argument: {0}")]
    MissingArgument(String),

    #[error("invalid lookup argument: {0}")]
    InvalidArgument(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("sheet '{sheet}' not found in table '{table}'")]
    SheetNotFound { table: String, sheet: String },

    #[error("no row '{row}' in {table}/{sheet}")]
    RowNotFound {
        table: String,
        sheet: String,
        row: String,
    },

    #[error("no column '{column}' in {table}/{sheet}")]
    ColumnNotFound {
        table: String,
        sheet: String,
        column: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl LookupError {
    pub(crate) fn row_not_found(request: &LookupRequest) -> Self {
        LookupError::RowNotFound {
            table: request.table.clone(),
            sheet: request.sheet.clone(),
            row: request.row.clone(),
        }
    }

    pub(crate) fn column_not_found(request: &LookupRequest) -> Self {
        LookupError::ColumnNotFound {
            table: request.table.clone(),
            sheet: request.sheet.clone(),
            column: request.column.clone(),
        }
    }
}

/// External tabular-data collaborator
pub trait TableLookup {
    fn lookup(&self, request: &LookupRequest) -> Result<String, LookupError>;
}

/// Collaborator used when no tables are configured
pub struct NoTables;

impl TableLookup for NoTables {
    fn lookup(&self, _request: &LookupRequest) -> Result<String, LookupError> {
        Err(LookupError::NotConfigured)
    }
}

/// Whether a row key matches the wanted key in range mode.
///
/// Returns `Some(None)` for a `lo-hi` key containing the wanted value (a
/// definite hit), `Some(Some(k))` for a single numeric key `k` not exceeding
/// it (a candidate; the greatest wins), `None` otherwise.
pub(crate) fn range_key_match(key: &str, wanted: f64) -> Option<Option<f64>> {
    let key = key.trim();
    if let Some(k) = parse_number(key) {
        return (k <= wanted).then_some(Some(k));
    }
    let (lo, hi) = split_range(key)?;
    let lo = parse_number(lo)?;
    let hi = parse_number(hi)?;
    (lo <= wanted && wanted <= hi).then_some(None)
}

/// Pick the best row index among `(index, key)` candidates in range mode
pub(crate) fn select_range_row<'a>(
    candidates: impl IntoIterator<Item = (usize, &'a str)>,
    wanted: &str,
) -> Option<usize> {
    let wanted = parse_number(wanted)?;
    let mut best: Option<(usize, f64)> = None;
    for (index, key) in candidates {
        match range_key_match(key, wanted) {
            Some(None) => return Some(index),
            Some(Some(k)) => {
                if best.map_or(true, |(_, b)| k > b) {
                    best = Some((index, k));
                }
            }
            None => {}
        }
    }
    best.map(|(index, _)| index)
}

#[derive(Debug, Clone)]
struct StaticEntry {
    table: String,
    sheet: String,
    row: String,
    column: String,
    filters: Vec<String>,
    value: String,
}

/// In-memory tables, one value per (table, sheet, row, column, filters)
#[derive(Debug, Clone, Default)]
pub struct StaticTables {
    entries: Vec<StaticEntry>,
}

impl StaticTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        table: &str,
        sheet: &str,
        row: &str,
        column: &str,
        filters: &[&str],
        value: &str,
    ) {
        self.entries.push(StaticEntry {
            table: table.to_string(),
            sheet: sheet.to_string(),
            row: row.to_string(),
            column: column.to_string(),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            value: value.to_string(),
        });
    }
}

impl TableLookup for StaticTables {
    fn lookup(&self, request: &LookupRequest) -> Result<String, LookupError> {
        let in_table: Vec<&StaticEntry> = self
            .entries
            .iter()
            .filter(|e| e.table == request.table)
            .collect();
        if in_table.is_empty() {
            return Err(LookupError::TableNotFound(request.table.clone()));
        }
        let in_sheet: Vec<&StaticEntry> = in_table
            .into_iter()
            .filter(|e| e.sheet == request.sheet)
            .collect();
        if in_sheet.is_empty() {
            return Err(LookupError::SheetNotFound {
                table: request.table.clone(),
                sheet: request.sheet.clone(),
            });
        }
        let candidates: Vec<&StaticEntry> = in_sheet
            .into_iter()
            .filter(|e| e.column == request.column && e.filters == request.filters)
            .collect();
        if candidates.is_empty() {
            return Err(LookupError::column_not_found(request));
        }

        let hit = if request.range {
            select_range_row(
                candidates.iter().enumerate().map(|(i, e)| (i, e.row.as_str())),
                &request.row,
            )
        } else {
            candidates.iter().position(|e| e.row == request.row)
        };

        hit.map(|i| candidates[i].value.clone())
            .ok_or_else(|| LookupError::row_not_found(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(row: &str, column: &str, range: bool) -> LookupRequest {
        LookupRequest {
            table: "pipes".to_string(),
            sheet: "steel".to_string(),
            row: row.to_string(),
            column: column.to_string(),
            filters: Vec::new(),
            range,
        }
    }

    fn tables() -> StaticTables {
        let mut tables = StaticTables::new();
        tables.insert("pipes", "steel", "0", "wall", &[], "1.5");
        tables.insert("pipes", "steel", "50", "wall", &[], "2");
        tables.insert("pipes", "steel", "100-200", "wall", &[], "3");
        tables.insert("pipes", "steel", "DN20", "weight", &[], "1.2");
        tables
    }

    #[test]
    fn test_exact_lookup() {
        assert_eq!(tables().lookup(&request("DN20", "weight", false)).unwrap(), "1.2");
    }

    #[test]
    fn test_range_lookup_threshold() {
        assert_eq!(tables().lookup(&request("75", "wall", true)).unwrap(), "2");
        assert_eq!(tables().lookup(&request("10", "wall", true)).unwrap(), "1.5");
    }

    #[test]
    fn test_range_lookup_interval() {
        assert_eq!(tables().lookup(&request("150", "wall", true)).unwrap(), "3");
    }

    #[test]
    fn test_range_keys_with_negative_bounds() {
        let rows = [(0, "-40--10"), (1, "-10-0"), (2, "0-25")];
        assert_eq!(select_range_row(rows, "-20"), Some(0));
        assert_eq!(select_range_row(rows, "-5"), Some(1));
        assert_eq!(select_range_row(rows, "10"), Some(2));
        assert_eq!(select_range_row(rows, "30"), None);
    }

    #[test]
    fn test_missing_pieces() {
        let tables = tables();
        let mut req = request("DN20", "weight", false);
        req.table = "nope".to_string();
        assert!(matches!(tables.lookup(&req), Err(LookupError::TableNotFound(_))));

        let mut req = request("DN20", "weight", false);
        req.sheet = "nope".to_string();
        assert!(matches!(tables.lookup(&req), Err(LookupError::SheetNotFound { .. })));

        assert!(matches!(
            tables.lookup(&request("DN20", "nope", false)),
            Err(LookupError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            tables.lookup(&request("DN99", "weight", false)),
            Err(LookupError::RowNotFound { .. })
        ));
    }

    #[test]
    fn test_no_tables() {
        assert!(matches!(
            NoTables.lookup(&request("1", "wall", false)),
            Err(LookupError::NotConfigured)
        ));
    }
}
