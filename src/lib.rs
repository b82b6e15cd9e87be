//! bomcalc: template calculation engine for configurable bills of material
//!
//! A template describes a product family: example markings, configuration
//! variants (relations) and the node tree of each variant with formula
//! cells. Calculating a template for an order marking picks the matching
//! variant, resolves every formula and prunes what the order does not use.

pub mod cli;
pub mod core;
pub mod engine;
pub mod entities;
pub mod schema;
pub mod yaml;
