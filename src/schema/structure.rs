//! Structural checks that a JSON schema cannot express
//!
//! Schema validation only sees one field at a time. These checks look at a
//! parsed [`Template`] as a whole: identifier uniqueness, `parts` references
//! between cells, pattern regexes and division branches.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::core::identity::ElementId;
use crate::entities::{Cell, Node, Relation, Template};

/// How serious a structural issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The template will calculate, but probably not as intended
    Warning,
    /// The template cannot be calculated reliably
    Error,
}

/// One finding of [`check_structure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureIssue {
    pub severity: Severity,
    pub message: String,
}

impl StructureIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: {}", self.message),
            Severity::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

/// Run every structural check against a template
pub fn check_structure(template: &Template) -> Vec<StructureIssue> {
    let mut issues = Vec::new();

    if template.markings.examples.is_empty() && !template.relations.is_empty() {
        issues.push(StructureIssue::warning(
            "no marking examples: every order will be rejected",
        ));
    }

    check_patterns(template, &mut issues);
    check_duplicate_ids(template, &mut issues);

    for (index, relation) in template.relations.iter().enumerate() {
        let label = relation_label(relation, index);
        check_parts(relation, &label, &mut issues);
        if !template.branches.is_empty() {
            check_division_branches(&relation.nodes, &template.branches, &label, &mut issues);
        }
    }

    issues
}

fn relation_label(relation: &Relation, index: usize) -> String {
    if relation.designation.is_empty() {
        format!("relation #{}", index + 1)
    } else {
        format!("relation #{} ({})", index + 1, relation.designation)
    }
}

fn check_patterns(template: &Template, issues: &mut Vec<StructureIssue>) {
    for group in &template.markings.pattern_groups {
        for pattern in &group.patterns {
            if let Err(e) = regex::Regex::new(&pattern.regex) {
                issues.push(StructureIssue::error(format!(
                    "pattern group '{}': invalid regex '{}': {}",
                    group.name, pattern.regex, e
                )));
            }
        }
    }
}

fn check_duplicate_ids(template: &Template, issues: &mut Vec<StructureIssue>) {
    let mut ids = Vec::new();
    for relation in &template.relations {
        ids.push(relation.id);
        ids.extend(relation.formulas.iter().chain(relation.terms.iter()).map(|c| c.id));
        collect_node_ids(&relation.nodes, &mut ids);
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            issues.push(StructureIssue::error(format!("duplicate id {}", id)));
        }
    }
}

fn collect_node_ids(nodes: &[Node], ids: &mut Vec<ElementId>) {
    for node in nodes {
        ids.push(node.id);
        ids.extend(node.own_cells().iter().map(|c| c.id));
        if let Some(tech) = &node.technology {
            for op in &tech.operations {
                ids.push(op.id);
                for div in &op.divisions {
                    ids.push(div.id);
                    ids.extend(div.materials.iter().map(|m| m.id));
                }
            }
        }
        collect_node_ids(&node.children, ids);
    }
}

/// Dangling `parts` references are tolerated at calculation time (they are
/// skipped), cycles are not
fn check_parts(relation: &Relation, label: &str, issues: &mut Vec<StructureIssue>) {
    let cells = relation.cells();
    let by_id: HashMap<ElementId, &Cell> = cells.iter().map(|c| (c.id, *c)).collect();

    for cell in &cells {
        for part in &cell.parts {
            if !by_id.contains_key(part) {
                issues.push(StructureIssue::warning(format!(
                    "{}: cell '{}' references unknown cell {}",
                    label, cell.name, part
                )));
            }
        }
    }

    let mut done: HashSet<ElementId> = HashSet::new();
    for cell in &cells {
        let mut path = Vec::new();
        if let Some(cycle) = find_cycle(cell, &by_id, &mut path, &mut done) {
            // Report each cycle once, not once per member
            done.extend(path.iter().map(|c| c.id));
            issues.push(StructureIssue::error(format!(
                "{}: circular parts reference: {}",
                label,
                cycle.join(" -> ")
            )));
        }
    }
}

fn find_cycle<'a>(
    cell: &'a Cell,
    by_id: &HashMap<ElementId, &'a Cell>,
    path: &mut Vec<&'a Cell>,
    done: &mut HashSet<ElementId>,
) -> Option<Vec<String>> {
    if done.contains(&cell.id) {
        return None;
    }
    if let Some(start) = path.iter().position(|c| c.id == cell.id) {
        let mut names: Vec<String> = path[start..].iter().map(|c| c.name.clone()).collect();
        names.push(cell.name.clone());
        return Some(names);
    }

    path.push(cell);
    for part in &cell.parts {
        if let Some(next) = by_id.get(part) {
            if let Some(cycle) = find_cycle(next, by_id, path, done) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    done.insert(cell.id);
    None
}

fn check_division_branches(
    nodes: &[Node],
    branches: &[String],
    label: &str,
    issues: &mut Vec<StructureIssue>,
) {
    for node in nodes {
        if let Some(tech) = &node.technology {
            for op in &tech.operations {
                for div in &op.divisions {
                    if !branches.contains(&div.branch) {
                        issues.push(StructureIssue::warning(format!(
                            "{}: node '{}', operation '{}' has a division for undeclared branch '{}'",
                            label, node.name, op.name, div.branch
                        )));
                    }
                }
            }
        }
        check_division_branches(&node.children, branches, label, issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Division, NodeKind, Operation, PatternDef, PatternGroupDef, Technology};
    use crate::core::identity::IdPrefix;

    fn template_with(relation: Relation) -> Template {
        let mut template = Template::new("Radiator");
        template.markings.examples.push("[Series]-[Height]".to_string());
        template.relations.push(relation);
        template
    }

    #[test]
    fn test_clean_template_has_no_issues() {
        let mut relation = Relation::new("RAD", "");
        let width = Cell::new("Width", "5");
        relation.formulas.push(Cell::new("Area", "[Width] * 2").with_parts([width.id]));
        relation.formulas.push(width);
        relation.nodes.push(Node::new(NodeKind::Part, "Panel"));
        assert!(check_structure(&template_with(relation)).is_empty());
    }

    #[test]
    fn test_missing_examples_warns() {
        let mut template = Template::new("Radiator");
        template.relations.push(Relation::new("RAD", ""));
        let issues = check_structure(&template);
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_duplicate_ids() {
        let mut relation = Relation::new("RAD", "");
        let cell = Cell::new("Width", "5");
        relation.formulas.push(cell.clone());
        relation.terms.push(cell);
        let issues = check_structure(&template_with(relation));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert!(issues[0].message.starts_with("duplicate id CELL-"));
    }

    #[test]
    fn test_dangling_parts_warns() {
        let mut relation = Relation::new("RAD", "");
        relation
            .formulas
            .push(Cell::new("Area", "[Width]").with_parts([ElementId::new(IdPrefix::Cell)]));
        let issues = check_structure(&template_with(relation));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("relation #1 (RAD)"));
    }

    #[test]
    fn test_parts_cycle() {
        let mut relation = Relation::new("", "");
        let mut a = Cell::new("A", "[B]");
        let mut b = Cell::new("B", "[A]");
        a.parts.push(b.id);
        b.parts.push(a.id);
        relation.formulas.push(a);
        relation.formulas.push(b);

        let issues = check_structure(&template_with(relation));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert_eq!(
            issues[0].message,
            "relation #1: circular parts reference: A -> B -> A"
        );
    }

    #[test]
    fn test_invalid_regex() {
        let mut template = template_with(Relation::new("RAD", ""));
        template.markings.pattern_groups.push(PatternGroupDef {
            name: "broken".to_string(),
            keyword: None,
            patterns: vec![PatternDef {
                regex: "(unclosed".to_string(),
                action: Default::default(),
                coating: false,
            }],
        });
        let issues = check_structure(&template);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("pattern group 'broken': invalid regex"));
    }

    #[test]
    fn test_unknown_division_branch() {
        let mut node = Node::new(NodeKind::Part, "Panel");
        let mut child = Node::new(NodeKind::Part, "Bracket");
        child.technology = Some(Technology {
            operations: vec![Operation {
                id: ElementId::new(IdPrefix::Oper),
                number: "010".to_string(),
                name: "Cutting".to_string(),
                divisions: vec![Division {
                    id: ElementId::new(IdPrefix::Div),
                    branch: "West".to_string(),
                    usage_condition: String::new(),
                    materials: Vec::new(),
                }],
            }],
        });
        node.add_child(child);
        let mut relation = Relation::new("RAD", "");
        relation.nodes.push(node);

        let mut template = template_with(relation);
        template.branches = vec!["Main".to_string()];
        let issues = check_structure(&template);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'Bracket', operation 'Cutting'"));
        assert!(issues[0].message.contains("'West'"));

        template.branches.clear();
        assert!(check_structure(&template).is_empty());
    }
}
