//! Template data model
//!
//! - [`Template`] - a product definition with ordered configuration variants
//! - [`Relation`] - one configuration variant owning a node tree
//! - [`Node`] - a part, assembly or material with its technology
//! - [`Cell`] - a named formula, term, amount, parameter or material field

pub mod cell;
pub mod node;
pub mod template;

pub use cell::Cell;
pub use node::{Division, MaterialUsage, Node, NodeKind, Operation, Technology};
pub use template::{
    MarkingCatalog, PatternAction, PatternDef, PatternGroupDef, Relation, Template,
};
