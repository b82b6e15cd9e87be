//! Calculation orchestrator
//!
//! tokenize -> select relation -> filter branch -> pool cells -> resolve ->
//! render display fields -> prune -> write resolved values back.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::context::{CalcContext, CellPool, Limits};
use crate::engine::error::CalcError;
use crate::engine::lookup::TableLookup;
use crate::engine::patterns::CompiledPatterns;
use crate::engine::prune::{filter_branch, prune_nodes, select_relation};
use crate::engine::tokenizer::{tokenize, Marking};
use crate::entities::{Cell, Node, Relation, Template};

/// Result of one calculation: a pruned copy of the template holding at most
/// one relation
#[derive(Debug, Clone, Serialize)]
pub struct Calculation {
    pub order: String,
    pub branch: String,
    pub marking: Marking,
    pub calculated: DateTime<Utc>,
    pub template: Template,
}

impl Calculation {
    /// The selected relation, if any applied
    pub fn relation(&self) -> Option<&Relation> {
        self.template.relations.first()
    }
}

/// Runs calculations against one table collaborator
pub struct Calculator<'a> {
    lookup: &'a dyn TableLookup,
    limits: Limits,
}

impl<'a> Calculator<'a> {
    pub fn new(lookup: &'a dyn TableLookup) -> Self {
        Self {
            lookup,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Extract the marking attributes of `order` for `template`
    pub fn tokenize(&self, template: &Template, order: &str) -> Result<Marking, CalcError> {
        let patterns = CompiledPatterns::compile(&template.markings)?;
        tokenize(order, &template.markings.examples, &patterns).ok_or_else(|| {
            CalcError::MarkingNotRecognized {
                marking: order.to_string(),
            }
        })
    }

    /// Calculate `template` for an order string and a branch.
    ///
    /// The template itself is never modified.
    pub fn calculate(
        &self,
        template: &Template,
        order: &str,
        branch: &str,
    ) -> Result<Calculation, CalcError> {
        if !template.accepts_branch(branch) {
            return Err(CalcError::BranchNotRecognized {
                branch: branch.to_string(),
                known: template.branches.join(", "),
            });
        }

        let marking = self.tokenize(template, order)?;
        tracing::debug!(example = %marking.example, attributes = ?marking.attributes, "order tokenized");

        let mut work = template.snapshot();
        let mut relations = std::mem::take(&mut work.relations);

        let mut selector =
            CalcContext::new(CellPool::default(), &marking, self.lookup, self.limits);
        let Some((index, literal)) = select_relation(&relations, &mut selector)? else {
            tracing::debug!(template = %template.name, "no relation applies");
            render_template_fields(&mut work, &mut selector)?;
            return Ok(self.finish(order, branch, marking.clone(), work));
        };

        let mut relation = relations.swap_remove(index);
        relation.usage_condition = literal;
        filter_branch(&mut relation.nodes, branch);

        let pool = CellPool::new(relation.cells().into_iter().cloned());
        let mut ctx = CalcContext::new(pool, &marking, self.lookup, self.limits);
        ctx.resolve_all()?;
        tracing::debug!(cells = ctx.pool().len(), "cells resolved");

        render_nodes(&mut relation.nodes, &mut ctx)?;
        relation.designation = ctx.render_field(&relation.designation)?;
        render_template_fields(&mut work, &mut ctx)?;

        prune_nodes(&mut relation.nodes, &mut ctx)?;
        write_back(&mut relation, &mut ctx)?;

        work.relations = vec![relation];
        Ok(self.finish(order, branch, marking.clone(), work))
    }

    fn finish(&self, order: &str, branch: &str, marking: Marking, template: Template) -> Calculation {
        Calculation {
            order: order.to_string(),
            branch: branch.to_string(),
            marking,
            calculated: Utc::now(),
            template,
        }
    }
}

fn render_template_fields(template: &mut Template, ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    template.name = ctx.render_field(&template.name)?;
    template.designation = ctx.render_field(&template.designation)?;
    Ok(())
}

fn render_nodes(nodes: &mut [Node], ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    for node in nodes.iter_mut() {
        node.name = ctx.render_field(&node.name)?;
        node.designation = ctx.render_field(&node.designation)?;
        if let Some(tech) = node.technology.as_mut() {
            for op in tech.operations.iter_mut() {
                op.name = ctx.render_field(&op.name)?;
            }
        }
        render_nodes(&mut node.children, ctx)?;
    }
    Ok(())
}

/// Copy resolved values into the surviving cells and reduce their usage
/// conditions to literals
fn write_back(relation: &mut Relation, ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    let mut failure = None;
    relation.visit_cells_mut(&mut |cell: &mut Cell| {
        if failure.is_some() {
            return;
        }
        if let Some(value) = ctx.pool().value_of(&cell.id) {
            cell.value = value.to_string();
        }
        match ctx.evaluate_condition(&cell.usage_condition) {
            Ok((literal, _)) => cell.usage_condition = literal,
            Err(err) => failure = Some(err),
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
