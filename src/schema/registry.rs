//! Embedded JSON schemas

use rust_embed::RustEmbed;
use std::collections::HashMap;

#[derive(RustEmbed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// Name of the template file schema
pub const TEMPLATE_SCHEMA: &str = "template";

/// Schemas compiled into the binary, keyed by name (`template` for
/// `template.schema.json`)
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, String>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut schemas = HashMap::new();
        for file in EmbeddedSchemas::iter() {
            let Some(name) = file.strip_suffix(".schema.json") else {
                continue;
            };
            if let Some(content) = EmbeddedSchemas::get(&file) {
                if let Ok(text) = std::str::from_utf8(&content.data) {
                    schemas.insert(name.to_string(), text.to_string());
                }
            }
        }
        Self { schemas }
    }
}

impl SchemaRegistry {
    /// Schema text by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.schemas.get(name).map(String::as_str)
    }

    /// Names of all embedded schemas, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_schema_embedded() {
        let registry = SchemaRegistry::default();
        let schema = registry.get(TEMPLATE_SCHEMA).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(schema).unwrap();
        assert_eq!(parsed["title"], "Calculation template");
        assert_eq!(registry.names(), vec!["template"]);
    }
}
