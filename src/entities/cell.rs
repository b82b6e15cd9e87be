//! Evaluator cell - the unit of text taking part in resolution

use serde::{Deserialize, Serialize};

use crate::core::identity::{new_cell_id, ElementId, IdPrefix};

/// A named formula, term, amount, parameter or material field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Unique identifier (CELL-...)
    #[serde(default = "new_cell_id")]
    pub id: ElementId,

    /// Name used by `[Name]` placeholders in other cells
    pub name: String,

    /// Formula text; rewritten in place while resolving
    #[serde(default)]
    pub value: String,

    /// Optional boolean expression gating the cell
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage_condition: String,

    /// Ids of the cells this value depends on explicitly
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ElementId>,
}

impl Cell {
    /// Create a new cell with a fresh id
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(IdPrefix::Cell),
            name: name.into(),
            value: value.into(),
            usage_condition: String::new(),
            parts: Vec::new(),
        }
    }

    /// Builder-style helper to declare explicit dependencies
    pub fn with_parts(mut self, parts: impl IntoIterator<Item = ElementId>) -> Self {
        self.parts.extend(parts);
        self
    }

    /// The default amount cell of a node
    pub fn amount(value: impl Into<String>) -> Self {
        Self::new("Amount", value)
    }

    /// The `[Name]` placeholder other cells use to reference this one
    pub fn placeholder(&self) -> String {
        format!("[{}]", self.name)
    }

    /// Whether this cell names a coating attribute
    pub fn is_coating(&self) -> bool {
        let lower = self.name.to_lowercase();
        COATING_NAMES.iter().any(|n| lower.contains(n))
    }
}

/// Name fragments marking a cell as the coating attribute
const COATING_NAMES: &[&str] = &["coating", "покрытие"];

pub(crate) fn default_amount_cell() -> Cell {
    Cell::amount("1")
}
