//! Template entity - configuration variants of a product and its marking catalog

use serde::{Deserialize, Serialize};

use crate::core::identity::{new_relation_id, new_template_id, ElementId, IdPrefix};
use crate::entities::cell::Cell;
use crate::entities::node::Node;

/// What happens to text matched by a marking pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatternAction {
    /// Replace with a placeholder token and restore it in extracted values
    #[default]
    Keep,
    /// Remove from the order string
    Discard,
}

/// A single regex applied to an order string before splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDef {
    pub regex: String,

    #[serde(default)]
    pub action: PatternAction,

    /// Matched text is the coating/material name of the order
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub coating: bool,
}

/// A named group of patterns, selected by keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternGroupDef {
    pub name: String,

    /// The group applies when the order string contains this keyword.
    /// A group without keyword is the generic fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,

    #[serde(default)]
    pub patterns: Vec<PatternDef>,
}

/// Example markings and the patterns used to read order strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkingCatalog {
    /// Example marking strings with `[Name]` placeholders, tried in order
    #[serde(default)]
    pub examples: Vec<String>,

    /// Pattern groups; the built-in library is used when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pattern_groups: Vec<PatternGroupDef>,

    /// Literal marker locating the marking when no uppercase run exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_marker: Option<String>,
}

/// Relation - one configuration variant owning a node tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Unique identifier (REL-...)
    #[serde(default = "new_relation_id")]
    pub id: ElementId,

    /// Display designation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub designation: String,

    /// Boolean expression selecting this variant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage_condition: String,

    /// Relation-level formula cells
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<Cell>,

    /// Relation-level boolean terms
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<Cell>,

    /// Top-level nodes of the tree
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Relation {
    pub fn new(designation: impl Into<String>, usage_condition: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(IdPrefix::Rel),
            designation: designation.into(),
            usage_condition: usage_condition.into(),
            formulas: Vec::new(),
            terms: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Every cell of the relation: formulas, terms, then the node tree
    pub fn cells(&self) -> Vec<&Cell> {
        let mut cells: Vec<&Cell> = self.formulas.iter().chain(self.terms.iter()).collect();
        fn collect<'a>(node: &'a Node, out: &mut Vec<&'a Cell>) {
            out.extend(node.own_cells());
            for child in &node.children {
                collect(child, out);
            }
        }
        for node in &self.nodes {
            collect(node, &mut cells);
        }
        cells
    }

    /// Visit every cell of the relation in the same order as [`Relation::cells`]
    pub fn visit_cells_mut(&mut self, f: &mut dyn FnMut(&mut Cell)) {
        for cell in self.formulas.iter_mut().chain(self.terms.iter_mut()) {
            f(cell);
        }
        for node in self.nodes.iter_mut() {
            node.visit_cells_mut(f);
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(Node::count).sum()
    }
}

/// Template - the stored, uncalculated product definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier (TPL-...)
    #[serde(default = "new_template_id")]
    pub id: ElementId,

    /// Template name
    pub name: String,

    /// Display designation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub designation: String,

    /// Production branches the template is defined for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    /// Example markings and marking patterns
    #[serde(default)]
    pub markings: MarkingCatalog,

    /// Configuration variants, in selection order
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(IdPrefix::Tpl),
            name: name.into(),
            designation: String::new(),
            branches: Vec::new(),
            markings: MarkingCatalog::default(),
            relations: Vec::new(),
        }
    }

    /// Independent copy preserving every identifier, used as the calculation
    /// working copy. Use [`Node::duplicate`] when fresh ids are needed.
    pub fn snapshot(&self) -> Template {
        self.clone()
    }

    /// Whether calculations may run for the given branch
    pub fn accepts_branch(&self, branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::node::NodeKind;

    #[test]
    fn test_snapshot_is_independent() {
        let mut template = Template::new("Radiator");
        let mut relation = Relation::new("RAD", "");
        relation.nodes.push(Node::new(NodeKind::Part, "Panel"));
        template.relations.push(relation);

        let mut copy = template.snapshot();
        copy.relations[0].nodes[0].name = "Changed".to_string();

        assert_eq!(template.relations[0].nodes[0].name, "Panel");
        assert_eq!(copy.relations[0].nodes[0].id, template.relations[0].nodes[0].id);
    }

    #[test]
    fn test_relation_cells_order() {
        let mut relation = Relation::new("RAD", "");
        relation.formulas.push(Cell::new("F", "1"));
        relation.terms.push(Cell::new("T", "true"));
        let mut node = Node::new(NodeKind::Part, "Panel");
        node.parameters.push(Cell::new("P", "2"));
        relation.nodes.push(node);

        let names: Vec<&str> = relation.cells().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["F", "T", "Amount", "P"]);
    }

    #[test]
    fn test_accepts_branch() {
        let mut template = Template::new("Radiator");
        assert!(template.accepts_branch("Anything"));
        template.branches = vec!["Main".to_string()];
        assert!(template.accepts_branch("Main"));
        assert!(!template.accepts_branch("East"));
    }

    #[test]
    fn test_template_yaml_parse() {
        let yaml = r#"
name: Radiator
branches: [Main]
markings:
  examples:
    - "[Series]-[Height]x[Length]"
  pattern_groups:
    - name: generic
      patterns:
        - regex: "RAL ?\\d{4}"
          coating: true
relations:
  - designation: "'RAD-' + [Height]"
    nodes:
      - name: Panel
        amount:
          name: Panels
          value: "2"
"#;
        let template: Template = serde_yml::from_str(yaml).unwrap();
        assert_eq!(template.markings.examples.len(), 1);
        assert!(template.markings.pattern_groups[0].patterns[0].coating);
        assert_eq!(
            template.markings.pattern_groups[0].patterns[0].action,
            PatternAction::Keep
        );
        assert_eq!(template.relations[0].nodes[0].amount.value, "2");
    }
}
