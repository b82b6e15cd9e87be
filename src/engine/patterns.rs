//! Marking pattern groups compiled for the tokenizer

use regex::Regex;

use crate::engine::error::CalcError;
use crate::entities::{MarkingCatalog, PatternAction, PatternDef, PatternGroupDef};

/// Marker used when a template does not declare one
pub const DEFAULT_FALLBACK_MARKER: &str = "#";

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub action: PatternAction,
    pub coating: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub name: String,
    pub keyword: Option<String>,
    pub patterns: Vec<CompiledPattern>,
}

/// Pattern groups and fallback marker of one marking catalog
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub groups: Vec<CompiledGroup>,
    pub fallback_marker: String,
}

impl CompiledPatterns {
    /// Compile the catalog's groups, or the built-in library when it has none
    pub fn compile(catalog: &MarkingCatalog) -> Result<Self, CalcError> {
        let defs = if catalog.pattern_groups.is_empty() {
            builtin_groups()
        } else {
            catalog.pattern_groups.clone()
        };

        let groups = defs
            .iter()
            .map(compile_group)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            groups,
            fallback_marker: catalog
                .fallback_marker
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_FALLBACK_MARKER.to_string()),
        })
    }

    /// First keyword group whose keyword occurs in `order`, else the first
    /// group without a keyword
    pub fn select(&self, order: &str) -> Option<&CompiledGroup> {
        self.groups
            .iter()
            .find(|g| g.keyword.as_deref().is_some_and(|k| !k.is_empty() && order.contains(k)))
            .or_else(|| self.groups.iter().find(|g| g.keyword.is_none()))
    }
}

fn compile_group(def: &PatternGroupDef) -> Result<CompiledGroup, CalcError> {
    let patterns = def
        .patterns
        .iter()
        .map(|p| {
            let regex = Regex::new(&p.regex).map_err(|source| CalcError::InvalidPattern {
                group: def.name.clone(),
                pattern: p.regex.clone(),
                source,
            })?;
            Ok(CompiledPattern {
                regex,
                action: p.action,
                coating: p.coating,
            })
        })
        .collect::<Result<Vec<_>, CalcError>>()?;

    Ok(CompiledGroup {
        name: def.name.clone(),
        keyword: def.keyword.clone(),
        patterns,
    })
}

/// Built-in pattern library: parenthesised remarks are dropped, a RAL colour
/// code is kept whole and reported as the coating
pub fn builtin_groups() -> Vec<PatternGroupDef> {
    vec![PatternGroupDef {
        name: "generic".to_string(),
        keyword: None,
        patterns: vec![
            PatternDef {
                regex: r"\s*\([^)]*\)".to_string(),
                action: PatternAction::Discard,
                coating: false,
            },
            PatternDef {
                regex: r"RAL\s?\d{4}".to_string(),
                action: PatternAction::Keep,
                coating: true,
            },
        ],
    }]
}
