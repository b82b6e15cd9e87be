//! Calculation context
//!
//! All working state of one calculation lives here: the cell arena of the
//! selected relation, the marking, the table collaborator and the cycle
//! bookkeeping. A context is built per invocation and dropped with it.

use std::collections::HashMap;

use crate::core::identity::ElementId;
use crate::engine::error::CalcError;
use crate::engine::functions::FunctionHost;
use crate::engine::lookup::{LookupRequest, TableLookup};
use crate::engine::tokenizer::Marking;
use crate::entities::Cell;

/// Iteration caps of the substitution passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Name-scan substitutions per cell without explicit parts
    pub name_scan: usize,
    /// Rounds of the field substitution pass
    pub substitution_rounds: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            name_scan: 500,
            substitution_rounds: 10,
        }
    }
}

/// Arena of evaluator cells indexed by id
#[derive(Debug, Clone, Default)]
pub struct CellPool {
    cells: Vec<Cell>,
    index: HashMap<ElementId, usize>,
}

impl CellPool {
    /// Build the arena; when ids repeat, the first cell owns the id
    pub fn new(cells: impl IntoIterator<Item = Cell>) -> Self {
        let cells: Vec<Cell> = cells.into_iter().collect();
        let mut index = HashMap::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            index.entry(cell.id).or_insert(i);
        }
        Self { cells, index }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub(crate) fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    pub fn index_of(&self, id: &ElementId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// First cell with the given name
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.cells.iter().position(|c| c.name == name)
    }

    pub fn value_of(&self, id: &ElementId) -> Option<&str> {
        self.index_of(id).map(|i| self.cells[i].value.as_str())
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Working state of one calculation
pub struct CalcContext<'a> {
    pub(crate) pool: CellPool,
    pub(crate) marking: &'a Marking,
    pub(crate) limits: Limits,
    lookup: &'a dyn TableLookup,
    /// Cells currently being resolved, outermost first
    pub(crate) stack: Vec<usize>,
    pub(crate) resolved: Vec<bool>,
}

impl<'a> CalcContext<'a> {
    pub fn new(
        pool: CellPool,
        marking: &'a Marking,
        lookup: &'a dyn TableLookup,
        limits: Limits,
    ) -> Self {
        let resolved = vec![false; pool.len()];
        Self {
            pool,
            marking,
            limits,
            lookup,
            stack: Vec::new(),
            resolved,
        }
    }

    pub fn pool(&self) -> &CellPool {
        &self.pool
    }

    pub fn marking(&self) -> &Marking {
        self.marking
    }

    pub fn is_resolved(&self, index: usize) -> bool {
        self.resolved.get(index).copied().unwrap_or(false)
    }

    /// Resolve every cell of the pool
    pub fn resolve_all(&mut self) -> Result<(), CalcError> {
        for index in 0..self.pool.len() {
            self.resolve(index)?;
        }
        Ok(())
    }

    pub(crate) fn cycle_error(&self, index: usize) -> CalcError {
        let start = self.stack.iter().position(|&i| i == index).unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..]
            .iter()
            .map(|&i| self.pool.cell(i).name.clone())
            .collect();
        path.push(self.pool.cell(index).name.clone());
        CalcError::Cycle { path }
    }
}

impl FunctionHost for CalcContext<'_> {
    fn resolve_reference(&mut self, text: &str) -> Result<Option<String>, CalcError> {
        let Ok(id) = ElementId::parse(text.trim().trim_matches('\'')) else {
            return Ok(None);
        };
        let Some(index) = self.pool.index_of(&id) else {
            return Ok(None);
        };
        self.resolve(index)?;
        Ok(Some(self.pool.cell(index).value.clone()))
    }

    fn lookup(&mut self, request: &LookupRequest) -> Result<String, CalcError> {
        tracing::debug!(
            table = %request.table,
            sheet = %request.sheet,
            row = %request.row,
            column = %request.column,
            range = request.range,
            "table lookup"
        );
        Ok(self.lookup.lookup(request)?)
    }
}
