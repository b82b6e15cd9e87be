//! Template identity system using type-prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Identifier prefixes for the elements of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdPrefix {
    /// Template
    Tpl,
    /// Relation (configuration variant)
    Rel,
    /// Node of a relation tree
    Node,
    /// Evaluator cell
    Cell,
    /// Technology operation
    Oper,
    /// Per-branch division of an operation
    Div,
    /// Material usage inside a division
    Mat,
}

impl IdPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Tpl => "TPL",
            IdPrefix::Rel => "REL",
            IdPrefix::Node => "NODE",
            IdPrefix::Cell => "CELL",
            IdPrefix::Oper => "OPER",
            IdPrefix::Div => "DIV",
            IdPrefix::Mat => "MAT",
        }
    }

    /// Get all valid prefixes
    pub fn all() -> &'static [IdPrefix] {
        &[
            IdPrefix::Tpl,
            IdPrefix::Rel,
            IdPrefix::Node,
            IdPrefix::Cell,
            IdPrefix::Oper,
            IdPrefix::Div,
            IdPrefix::Mat,
        ]
    }
}

impl fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IdPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TPL" => Ok(IdPrefix::Tpl),
            "REL" => Ok(IdPrefix::Rel),
            "NODE" => Ok(IdPrefix::Node),
            "CELL" => Ok(IdPrefix::Cell),
            "OPER" => Ok(IdPrefix::Oper),
            "DIV" => Ok(IdPrefix::Div),
            "MAT" => Ok(IdPrefix::Mat),
            _ => Err(IdParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A unique identifier combining a type prefix and ULID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    prefix: IdPrefix,
    ulid: Ulid,
}

impl ElementId {
    /// Create a new id with the given prefix
    pub fn new(prefix: IdPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Create an id from a prefix and existing ULID
    pub fn from_parts(prefix: IdPrefix, ulid: Ulid) -> Self {
        Self { prefix, ulid }
    }

    pub fn prefix(&self) -> IdPrefix {
        self.prefix
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an id from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Same prefix, fresh ULID
    pub fn regenerate(&self) -> Self {
        Self::new(self.prefix)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for ElementId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let prefix = prefix_str.parse()?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { prefix, ulid })
    }
}

impl Serialize for ElementId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// serde `default` helpers so hand-written templates may omit ids
pub(crate) fn new_template_id() -> ElementId {
    ElementId::new(IdPrefix::Tpl)
}

pub(crate) fn new_relation_id() -> ElementId {
    ElementId::new(IdPrefix::Rel)
}

pub(crate) fn new_node_id() -> ElementId {
    ElementId::new(IdPrefix::Node)
}

pub(crate) fn new_cell_id() -> ElementId {
    ElementId::new(IdPrefix::Cell)
}

pub(crate) fn new_operation_id() -> ElementId {
    ElementId::new(IdPrefix::Oper)
}

pub(crate) fn new_division_id() -> ElementId {
    ElementId::new(IdPrefix::Div)
}

pub(crate) fn new_material_id() -> ElementId {
    ElementId::new(IdPrefix::Mat)
}

/// Errors that can occur when parsing ids
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid id prefix: '{0}' (valid: TPL, REL, NODE, CELL, OPER, DIV, MAT)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in id: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let id = ElementId::new(IdPrefix::Cell);
        assert!(id.to_string().starts_with("CELL-"));
        assert_eq!(id.to_string().len(), 31); // CELL- (5) + ULID (26)
    }

    #[test]
    fn test_id_parsing() {
        let original = ElementId::new(IdPrefix::Node);
        let parsed = ElementId::parse(&original.to_string()).unwrap();
        assert_eq!(parsed.prefix(), IdPrefix::Node);
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_id_invalid_prefix() {
        let err = ElementId::parse("XXX-01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidPrefix(_)));
    }

    #[test]
    fn test_id_missing_delimiter() {
        let err = ElementId::parse("CELL01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::MissingDelimiter(_)));
    }

    #[test]
    fn test_id_invalid_ulid() {
        let err = ElementId::parse("CELL-notaulid").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidUlid(_, _)));
    }

    #[test]
    fn test_regenerate_keeps_prefix() {
        let id = ElementId::new(IdPrefix::Div);
        let fresh = id.regenerate();
        assert_eq!(fresh.prefix(), IdPrefix::Div);
        assert_ne!(fresh, id);
    }

    #[test]
    fn test_all_prefixes_parse() {
        for prefix in IdPrefix::all() {
            let id = ElementId::new(*prefix);
            let parsed = ElementId::parse(&id.to_string()).unwrap();
            assert_eq!(parsed.prefix(), *prefix);
        }
    }

    #[test]
    fn test_ids_index_hash_maps() {
        use std::collections::HashMap;

        let a = ElementId::new(IdPrefix::Cell);
        let b = ElementId::new(IdPrefix::Cell);
        let index: HashMap<ElementId, usize> = [(a, 0), (b, 1)].into_iter().collect();
        assert_eq!(index.get(&a), Some(&0));
        assert_eq!(index.get(&ElementId::parse(&b.to_string()).unwrap()), Some(&1));
    }
}
