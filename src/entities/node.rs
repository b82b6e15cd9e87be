//! Node entity - parts, assemblies and materials of a relation tree

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::identity::{
    new_division_id, new_material_id, new_node_id, new_operation_id, ElementId, IdPrefix,
};
use crate::entities::cell::{default_amount_cell, Cell};

/// Kind of a tree element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Assembly,
    #[default]
    Part,
    Material,
    Standard,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Assembly => write!(f, "assembly"),
            NodeKind::Part => write!(f, "part"),
            NodeKind::Material => write!(f, "material"),
            NodeKind::Standard => write!(f, "standard"),
        }
    }
}

/// Material consumed by a division: a name cell and a consumption cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialUsage {
    /// Unique identifier (MAT-...)
    #[serde(default = "new_material_id")]
    pub id: ElementId,

    /// Material name formula
    pub name: Cell,

    /// Consumption formula
    pub consumption: Cell,
}

/// Per-branch data of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    /// Unique identifier (DIV-...)
    #[serde(default = "new_division_id")]
    pub id: ElementId,

    /// Production branch this division applies to
    pub branch: String,

    /// Boolean expression gating the division
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage_condition: String,

    /// Materials consumed in this branch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<MaterialUsage>,
}

/// One step of a technology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier (OPER-...)
    #[serde(default = "new_operation_id")]
    pub id: ElementId,

    /// Operation number (e.g. "010")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub number: String,

    /// Operation name
    pub name: String,

    /// Per-branch divisions
    #[serde(default)]
    pub divisions: Vec<Division>,
}

/// Ordered operations attached to a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// A physical part, assembly or material in a relation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (NODE-...)
    #[serde(default = "new_node_id")]
    pub id: ElementId,

    /// Element kind
    #[serde(default)]
    pub kind: NodeKind,

    /// Display name
    pub name: String,

    /// Display designation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub designation: String,

    /// Quantity cell; a node whose amount resolves to zero is pruned
    #[serde(default = "default_amount_cell")]
    pub amount: Cell,

    /// Boolean expression gating the node
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage_condition: String,

    /// Free parameter cells
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Cell>,

    /// Attached technology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<Technology>,

    /// Child nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a new part node with amount 1
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(IdPrefix::Node),
            kind,
            name: name.into(),
            designation: String::new(),
            amount: default_amount_cell(),
            usage_condition: String::new(),
            parameters: Vec::new(),
            technology: None,
            children: Vec::new(),
        }
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Cells owned directly by this node (amount, parameters, materials)
    pub fn own_cells(&self) -> Vec<&Cell> {
        let mut cells = vec![&self.amount];
        cells.extend(self.parameters.iter());
        if let Some(tech) = &self.technology {
            for op in &tech.operations {
                for div in &op.divisions {
                    for mat in &div.materials {
                        cells.push(&mat.name);
                        cells.push(&mat.consumption);
                    }
                }
            }
        }
        cells
    }

    /// Mutable access to the cells owned directly by this node
    pub fn own_cells_mut(&mut self) -> Vec<&mut Cell> {
        let mut cells = vec![&mut self.amount];
        cells.extend(self.parameters.iter_mut());
        if let Some(tech) = self.technology.as_mut() {
            for op in tech.operations.iter_mut() {
                for div in op.divisions.iter_mut() {
                    for mat in div.materials.iter_mut() {
                        cells.push(&mut mat.name);
                        cells.push(&mut mat.consumption);
                    }
                }
            }
        }
        cells
    }

    /// Visit every cell of this subtree, depth-first, parents before children
    pub fn visit_cells_mut(&mut self, f: &mut dyn FnMut(&mut Cell)) {
        for cell in self.own_cells_mut() {
            f(cell);
        }
        for child in self.children.iter_mut() {
            child.visit_cells_mut(f);
        }
    }

    /// Total number of nodes in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    /// Copy this subtree with every identifier regenerated.
    ///
    /// `parts` references pointing at cells inside the subtree are rewritten to
    /// the new ids; references to cells outside the subtree are kept as-is.
    pub fn duplicate(&self) -> Node {
        let mut copy = self.clone();
        let mut remap: HashMap<ElementId, ElementId> = HashMap::new();
        copy.regenerate_ids(&mut remap);
        copy.visit_cells_mut(&mut |cell: &mut Cell| {
            for part in cell.parts.iter_mut() {
                if let Some(new_id) = remap.get(part) {
                    *part = *new_id;
                }
            }
        });
        copy
    }

    fn regenerate_ids(&mut self, remap: &mut HashMap<ElementId, ElementId>) {
        self.id = self.id.regenerate();
        for cell in self.own_cells_mut() {
            let fresh = cell.id.regenerate();
            remap.insert(cell.id, fresh);
            cell.id = fresh;
        }
        if let Some(tech) = self.technology.as_mut() {
            for op in tech.operations.iter_mut() {
                op.id = op.id.regenerate();
                for div in op.divisions.iter_mut() {
                    div.id = div.id.regenerate();
                    for mat in div.materials.iter_mut() {
                        mat.id = mat.id.regenerate();
                    }
                }
            }
        }
        for child in self.children.iter_mut() {
            child.regenerate_ids(remap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Node {
        let mut root = Node::new(NodeKind::Assembly, "Frame");
        let width = Cell::new("Width", "120");
        let double = Cell::new("Double", "[Width]*2").with_parts([width.id]);
        root.parameters = vec![width, double];

        let mut leg = Node::new(NodeKind::Part, "Leg");
        leg.amount = Cell::amount("4");
        leg.technology = Some(Technology {
            operations: vec![Operation {
                id: ElementId::new(IdPrefix::Oper),
                number: "010".to_string(),
                name: "Cutting".to_string(),
                divisions: vec![Division {
                    id: ElementId::new(IdPrefix::Div),
                    branch: "Main".to_string(),
                    usage_condition: String::new(),
                    materials: vec![MaterialUsage {
                        id: ElementId::new(IdPrefix::Mat),
                        name: Cell::new("Steel", "'S235'"),
                        consumption: Cell::new("SteelRate", "0.5"),
                    }],
                }],
            }],
        });
        root.add_child(leg);
        root
    }

    #[test]
    fn test_own_cells_include_materials() {
        let tree = sample_tree();
        assert_eq!(tree.own_cells().len(), 3);
        assert_eq!(tree.children[0].own_cells().len(), 3);
        assert_eq!(tree.count(), 2);
    }

    #[test]
    fn test_duplicate_regenerates_ids() {
        let tree = sample_tree();
        let copy = tree.duplicate();

        assert_ne!(copy.id, tree.id);
        assert_ne!(copy.children[0].id, tree.children[0].id);
        assert_ne!(copy.parameters[0].id, tree.parameters[0].id);

        let op = &copy.children[0].technology.as_ref().unwrap().operations[0];
        let orig_op = &tree.children[0].technology.as_ref().unwrap().operations[0];
        assert_ne!(op.id, orig_op.id);
        assert_ne!(op.divisions[0].id, orig_op.divisions[0].id);
        assert_ne!(op.divisions[0].materials[0].id, orig_op.divisions[0].materials[0].id);
    }

    #[test]
    fn test_duplicate_remaps_internal_parts() {
        let tree = sample_tree();
        let copy = tree.duplicate();
        assert_eq!(copy.parameters[1].parts, vec![copy.parameters[0].id]);
    }

    #[test]
    fn test_duplicate_keeps_external_parts() {
        let external = ElementId::new(IdPrefix::Cell);
        let mut tree = sample_tree();
        tree.parameters[1].parts.push(external);

        let copy = tree.duplicate();
        assert_eq!(copy.parameters[1].parts[1], external);
    }

    #[test]
    fn test_node_yaml_defaults() {
        let node: Node = serde_yml::from_str("name: Bolt\n").unwrap();
        assert_eq!(node.kind, NodeKind::Part);
        assert_eq!(node.amount.value, "1");
        assert!(node.children.is_empty());
    }
}
