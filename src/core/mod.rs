//! Core module - identifiers, configuration and template loading

pub mod config;
pub mod identity;
pub mod loader;

pub use config::Config;
pub use identity::{ElementId, IdParseError, IdPrefix};
pub use loader::{expand_paths, load_template, parse_template, TEMPLATE_SUFFIX};
