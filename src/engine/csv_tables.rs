//! Table lookups backed by a directory of CSV files
//!
//! Layout: `<root>/<table>/<sheet>.csv`. The header row holds the column keys,
//! column 0 is the row key and the next `filters.len()` columns are matched
//! against the extra filter values of the request.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use crate::engine::lookup::{select_range_row, LookupError, LookupRequest, TableLookup};

#[derive(Debug)]
struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// CSV-directory collaborator; parsed sheets are cached per instance
#[derive(Debug)]
pub struct CsvTables {
    root: PathBuf,
    cache: RefCell<HashMap<PathBuf, Rc<Sheet>>>,
}

impl CsvTables {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sheet(&self, request: &LookupRequest) -> Result<Rc<Sheet>, LookupError> {
        plain_name("table", &request.table)?;
        plain_name("sheet", &request.sheet)?;
        let table_dir = self.root.join(&request.table);
        if !table_dir.is_dir() {
            return Err(LookupError::TableNotFound(request.table.clone()));
        }
        let path = table_dir.join(format!("{}.csv", request.sheet));
        if let Some(sheet) = self.cache.borrow().get(&path) {
            return Ok(Rc::clone(sheet));
        }
        if !path.is_file() {
            return Err(LookupError::SheetNotFound {
                table: request.table.clone(),
                sheet: request.sheet.clone(),
            });
        }

        let sheet = Rc::new(read_sheet(&path)?);
        tracing::debug!(path = %path.display(), rows = sheet.rows.len(), "loaded lookup sheet");
        self.cache.borrow_mut().insert(path, Rc::clone(&sheet));
        Ok(sheet)
    }
}

/// Table and sheet names come from formula text and must stay inside the root
fn plain_name(what: &str, name: &str) -> Result<(), LookupError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(LookupError::InvalidArgument(format!(
            "{} name '{}' must be a plain name without path separators",
            what, name
        ))),
    }
}

fn read_sheet(path: &Path) -> Result<Sheet, LookupError> {
    let csv_err = |source: csv::Error| LookupError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(|v| v.trim().to_string()).collect());
    }

    Ok(Sheet { headers, rows })
}

impl TableLookup for CsvTables {
    fn lookup(&self, request: &LookupRequest) -> Result<String, LookupError> {
        let sheet = self.sheet(request)?;

        let column = sheet
            .headers
            .iter()
            .position(|h| h == request.column.trim())
            .filter(|&i| i > request.filters.len())
            .ok_or_else(|| LookupError::column_not_found(request))?;

        let candidates: Vec<(usize, &str)> = sheet
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                request.filters.iter().enumerate().all(|(i, filter)| {
                    row.get(i + 1).map(String::as_str) == Some(filter.trim())
                })
            })
            .map(|(i, row)| (i, row.first().map(String::as_str).unwrap_or("")))
            .collect();

        let hit = if request.range {
            select_range_row(candidates.iter().copied(), &request.row)
        } else {
            candidates
                .iter()
                .find(|(_, key)| *key == request.row.trim())
                .map(|(i, _)| *i)
        };

        let index = hit.ok_or_else(|| LookupError::row_not_found(request))?;
        Ok(sheet.rows[index].get(column).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn request(row: &str, column: &str, filters: &[&str], range: bool) -> LookupRequest {
        LookupRequest {
            table: "fasteners".to_string(),
            sheet: "bolts".to_string(),
            row: row.to_string(),
            column: column.to_string(),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            range,
        }
    }

    fn setup() -> (tempfile::TempDir, CsvTables) {
        let dir = tempdir().unwrap();
        let table = dir.path().join("fasteners");
        fs::create_dir_all(&table).unwrap();
        fs::write(
            table.join("bolts.csv"),
            "size,finish,length,mass\nM8,zinc,40,0.02\nM8,plain,40,0.019\nM10,zinc,50,0.04\n",
        )
        .unwrap();
        fs::write(table.join("spans.csv"), "span,count\n0,2\n1000,3\n2000-3000,4\n").unwrap();
        let tables = CsvTables::new(dir.path());
        (dir, tables)
    }

    #[test]
    fn test_exact_with_filter() {
        let (_dir, tables) = setup();
        let value = tables.lookup(&request("M8", "mass", &["plain"], false)).unwrap();
        assert_eq!(value, "0.019");
    }

    #[test]
    fn test_range_lookup() {
        let (_dir, tables) = setup();
        let mut req = request("1500", "count", &[], true);
        req.sheet = "spans".to_string();
        assert_eq!(tables.lookup(&req).unwrap(), "3");
        req.row = "2500".to_string();
        assert_eq!(tables.lookup(&req).unwrap(), "4");
    }

    #[test]
    fn test_filter_column_is_not_a_value_column() {
        let (_dir, tables) = setup();
        assert!(matches!(
            tables.lookup(&request("M8", "finish", &["zinc"], false)),
            Err(LookupError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_table_and_sheet() {
        let (_dir, tables) = setup();
        let mut req = request("M8", "mass", &[], false);
        req.table = "nope".to_string();
        assert!(matches!(tables.lookup(&req), Err(LookupError::TableNotFound(_))));

        let mut req = request("M8", "mass", &[], false);
        req.sheet = "nope".to_string();
        assert!(matches!(tables.lookup(&req), Err(LookupError::SheetNotFound { .. })));
    }

    #[test]
    fn test_row_not_found() {
        let (_dir, tables) = setup();
        assert!(matches!(
            tables.lookup(&request("M12", "mass", &["zinc"], false)),
            Err(LookupError::RowNotFound { .. })
        ));
    }

    #[test]
    fn test_names_cannot_leave_root() {
        let (dir, tables) = setup();
        fs::write(dir.path().join("secret.csv"), "key,value
k,v
").unwrap();

        for (table, sheet) in [
            ("fasteners", "../../secret"),
            ("..", "secret"),
            ("fasteners/..", "secret"),
            ("/etc", "passwd"),
            ("", "bolts"),
        ] {
            let mut req = request("k", "value", &[], false);
            req.table = table.to_string();
            req.sheet = sheet.to_string();
            assert!(
                matches!(tables.lookup(&req), Err(LookupError::InvalidArgument(_))),
                "{table}/{sheet} was accepted"
            );
        }
    }
}
