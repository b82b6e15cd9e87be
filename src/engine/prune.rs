//! Relation selection and tree pruning

use crate::engine::context::CalcContext;
use crate::engine::error::CalcError;
use crate::engine::expr::parse_number;
use crate::entities::{Node, Relation, Technology};

/// Index of the first relation whose condition is empty or true, with the
/// condition's literal result. Later relations are not evaluated.
pub fn select_relation(
    relations: &[Relation],
    ctx: &mut CalcContext<'_>,
) -> Result<Option<(usize, String)>, CalcError> {
    for (index, relation) in relations.iter().enumerate() {
        let (literal, holds) = ctx.evaluate_condition(&relation.usage_condition)?;
        tracing::debug!(
            relation = %relation.designation,
            condition = %relation.usage_condition,
            result = %literal,
            "relation condition"
        );
        if holds {
            return Ok(Some((index, literal)));
        }
    }
    Ok(None)
}

/// Keep only the divisions of `branch`. Operations whose divisions all
/// belong to other branches are dropped.
pub fn filter_branch(nodes: &mut [Node], branch: &str) {
    for node in nodes.iter_mut() {
        if let Some(tech) = node.technology.as_mut() {
            tech.operations.retain_mut(|op| {
                if op.divisions.is_empty() {
                    return true;
                }
                op.divisions.retain(|d| d.branch == branch);
                !op.divisions.is_empty()
            });
        }
        filter_branch(&mut node.children, branch);
    }
}

fn is_zero(amount: &str) -> bool {
    parse_number(amount.trim().trim_matches('\'')).is_some_and(|n| n == 0.0)
}

/// Remove every node whose own condition fails or whose amount is zero.
///
/// Children are decided before their parent; a node's fate depends on its
/// own condition and amount only. Surviving conditions are replaced by their
/// literal result.
pub fn prune_nodes(nodes: &mut Vec<Node>, ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    let mut kept = Vec::with_capacity(nodes.len());
    for mut node in nodes.drain(..) {
        prune_nodes(&mut node.children, ctx)?;

        let (literal, holds) = ctx.evaluate_condition(&node.usage_condition)?;
        if !holds {
            tracing::debug!(node = %node.name, condition = %node.usage_condition, "node removed by condition");
            continue;
        }

        let amount = ctx
            .pool()
            .value_of(&node.amount.id)
            .unwrap_or(node.amount.value.as_str());
        if is_zero(amount) {
            tracing::debug!(node = %node.name, "node removed by zero amount");
            continue;
        }

        node.usage_condition = literal;
        if let Some(tech) = node.technology.as_mut() {
            prune_technology(tech, ctx)?;
        }
        if node.technology.as_ref().is_some_and(|t| t.operations.is_empty()) {
            node.technology = None;
        }
        kept.push(node);
    }
    *nodes = kept;
    Ok(())
}

/// Drop divisions whose condition fails, and operations left without any
fn prune_technology(tech: &mut Technology, ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    let mut operations = Vec::with_capacity(tech.operations.len());
    for mut op in tech.operations.drain(..) {
        let had_divisions = !op.divisions.is_empty();
        let mut divisions = Vec::with_capacity(op.divisions.len());
        for mut division in op.divisions.drain(..) {
            let (literal, holds) = ctx.evaluate_condition(&division.usage_condition)?;
            if holds {
                division.usage_condition = literal;
                divisions.push(division);
            }
        }
        op.divisions = divisions;
        if had_divisions && op.divisions.is_empty() {
            tracing::debug!(operation = %op.name, "operation removed, no applicable division");
            continue;
        }
        operations.push(op);
    }
    tech.operations = operations;
    Ok(())
}
