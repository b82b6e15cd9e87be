//! Shared helper functions for CLI commands

use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style};

use crate::core::Config;
use crate::engine::{Calculation, CsvTables, NoTables, TableLookup};
use crate::entities::{Node, Operation};

/// Table collaborator for a command: an explicit directory wins over the
/// configured one; without either every lookup fails
pub fn open_tables(explicit: Option<&Path>, config: &Config) -> Box<dyn TableLookup> {
    match explicit.or(config.tables_dir.as_deref()) {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "using CSV tables");
            Box::new(CsvTables::new(dir))
        }
        None => Box::new(NoTables),
    }
}

/// Write command output to a file or stdout
pub fn write_output(content: &str, output_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(&path).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes()).into_diagnostic()?;
            if !quiet {
                eprintln!("{} Written to {}", style("✓").green(), style(path.display()).cyan());
            }
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Render a calculation as an indented BOM tree
pub fn render_tree(calc: &Calculation) -> String {
    let mut out = String::new();
    let template = &calc.template;
    if template.designation.is_empty() {
        out.push_str(&format!("{}\n", template.name));
    } else {
        out.push_str(&format!("{} {}\n", template.name, template.designation));
    }
    out.push_str(&format!("order: {}\n", calc.order));
    if !calc.branch.is_empty() {
        out.push_str(&format!("branch: {}\n", calc.branch));
    }

    let Some(relation) = calc.relation() else {
        out.push_str("no relation applies\n");
        return out;
    };
    if relation.designation.is_empty() {
        out.push_str("relation\n");
    } else {
        out.push_str(&format!("relation: {}\n", relation.designation));
    }
    push_nodes(&mut out, &relation.nodes, "");
    out
}

fn push_nodes(out: &mut String, nodes: &[Node], prefix: &str) {
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i == nodes.len() - 1;
        let branch = if is_last { "└─ " } else { "├─ " };
        out.push_str(&format!("{}{}{}\n", prefix, branch, node_label(node)));

        let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
        let operations: &[Operation] = node
            .technology
            .as_ref()
            .map(|t| t.operations.as_slice())
            .unwrap_or(&[]);
        for (j, op) in operations.iter().enumerate() {
            let last_item = j == operations.len() - 1 && node.children.is_empty();
            push_operation(out, op, &child_prefix, last_item);
        }
        push_nodes(out, &node.children, &child_prefix);
    }
}

fn push_operation(out: &mut String, op: &Operation, prefix: &str, is_last: bool) {
    let branch = if is_last { "└─ " } else { "├─ " };
    let number = if op.number.is_empty() {
        String::new()
    } else {
        format!("{} ", op.number)
    };
    out.push_str(&format!("{}{}op {}{}\n", prefix, branch, number, op.name));

    let inner = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    let materials: Vec<_> = op.divisions.iter().flat_map(|d| d.materials.iter()).collect();
    for (k, mat) in materials.iter().enumerate() {
        let branch = if k == materials.len() - 1 { "└─ " } else { "├─ " };
        out.push_str(&format!(
            "{}{}{}: {}\n",
            inner, branch, mat.name.value, mat.consumption.value
        ));
    }
}

fn node_label(node: &Node) -> String {
    let mut label = node.name.clone();
    if !node.designation.is_empty() {
        label.push(' ');
        label.push_str(&node.designation);
    }
    label.push_str(&format!(" x{}", node.amount.value));
    label
}

/// Render a calculation as a flat markdown table, one row per node
pub fn render_table(calc: &Calculation) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Level", "Kind", "Name", "Designation", "Amount"]);

    fn push_rows(builder: &mut Builder, nodes: &[Node], level: usize) {
        for node in nodes {
            builder.push_record([
                level.to_string(),
                node.kind.to_string(),
                node.name.clone(),
                node.designation.clone(),
                node.amount.value.clone(),
            ]);
            push_rows(builder, &node.children, level + 1);
        }
    }

    if let Some(relation) = calc.relation() {
        push_rows(&mut builder, &relation.nodes, 1);
    }
    let mut table = builder.build().with(Style::markdown()).to_string();
    table.push('\n');
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Calculator, StaticTables};
    use crate::entities::{Cell, Division, MaterialUsage, NodeKind, Relation, Technology, Template};

    fn calculation() -> Calculation {
        let mut template = Template::new("Radiator");
        template.markings.examples.push("[Series]-[Height]".to_string());

        let mut panel = Node::new(NodeKind::Assembly, "Panel");
        panel.amount = Cell::amount("2");
        let mut op = Operation {
            id: crate::core::ElementId::new(crate::core::IdPrefix::Oper),
            number: "010".to_string(),
            name: "Welding".to_string(),
            divisions: Vec::new(),
        };
        op.divisions.push(Division {
            id: crate::core::ElementId::new(crate::core::IdPrefix::Div),
            branch: "Main".to_string(),
            usage_condition: String::new(),
            materials: vec![MaterialUsage {
                id: crate::core::ElementId::new(crate::core::IdPrefix::Mat),
                name: Cell::new("Material", "Wire"),
                consumption: Cell::new("Wire length", "[Height] / 100"),
            }],
        });
        panel.technology = Some(Technology { operations: vec![op] });
        panel.add_child(Node::new(NodeKind::Part, "Fin"));

        let mut relation = Relation::new("'RAD-' + [Height]", "");
        relation.nodes.push(panel);
        relation.nodes.push(Node::new(NodeKind::Standard, "Bolt"));
        template.relations.push(relation);

        let tables = StaticTables::new();
        Calculator::new(&tables)
            .calculate(&template, "AB-500", "Main")
            .unwrap()
    }

    #[test]
    fn test_render_tree() {
        let tree = render_tree(&calculation());
        let expected = "\
Radiator
order: AB-500
branch: Main
relation: RAD-500
├─ Panel x2
│  ├─ op 010 Welding
│  │  └─ Wire: 5
│  └─ Fin x1
└─ Bolt x1
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&calculation());
        assert!(table.contains("| Level |"));
        assert!(table.contains("| Fin "));
        assert_eq!(table.lines().count(), 5);
    }
}
