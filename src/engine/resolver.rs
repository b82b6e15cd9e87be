//! Expression resolver
//!
//! Rewrites cell values in place: dependencies are resolved depth-first and
//! substituted at their `[Name]` placeholders, then the text is evaluated.
//! Evaluation failures leave the substituted text as the value; host
//! failures (lookups, cycles) abort the calculation.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::context::CalcContext;
use crate::engine::error::CalcError;
use crate::engine::expr::{
    evaluate, has_ternary, is_formula, is_numeric, needs_evaluation, ExprError, EMPTY_LITERAL,
};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid regex"))
}

fn remnant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\[[^\[\]]*\]").expect("valid regex"))
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2
        && ((text.starts_with('\'') && text.ends_with('\''))
            || (text.starts_with('"') && text.ends_with('"')))
}

/// Strip one pair of surrounding quotes
pub fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    if is_quoted(trimmed) {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn is_bool_literal(text: &str) -> bool {
    matches!(
        text.to_lowercase().as_str(),
        "true" | "false" | "истина" | "ложь"
    )
}

fn replacement(value: &str, inside_quotes: bool) -> String {
    let value = value.trim();
    if inside_quotes {
        if value == EMPTY_LITERAL {
            return String::new();
        }
        return unquote(value).to_string();
    }
    if value.is_empty() || value == EMPTY_LITERAL {
        EMPTY_LITERAL.to_string()
    } else if is_numeric(value) || is_bool_literal(value) || is_quoted(value) {
        value.to_string()
    } else {
        format!("'{}'", value)
    }
}

/// Replace every `[name]` in `text` with `value`.
///
/// Inside a quoted literal the value goes in bare, without its own quotes.
/// Outside quotes a non-numeric value is quoted and an empty one becomes
/// `''`.
pub fn substitute_placeholder(text: &str, name: &str, value: &str) -> String {
    let placeholder = format!("[{}]", name);
    if !text.contains(&placeholder) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + value.len());
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with(&placeholder) {
            out.push_str(&replacement(value, quote.is_some()));
            i += placeholder.len();
            continue;
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '\'' || c == '"' => quote = Some(c),
            _ => {}
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Whether a rendered condition result counts as true
pub fn condition_holds(result: &str) -> bool {
    let result = unquote(result).to_lowercase();
    result.is_empty() || result == "true" || result == "истина"
}

impl CalcContext<'_> {
    /// Resolve one cell of the pool; each cell is resolved at most once
    pub fn resolve(&mut self, index: usize) -> Result<(), CalcError> {
        if self.is_resolved(index) {
            return Ok(());
        }
        if self.stack.contains(&index) {
            return Err(self.cycle_error(index));
        }

        self.stack.push(index);
        let result = self.resolve_value(index);
        self.stack.pop();

        let value = result?;
        tracing::trace!(cell = %self.pool.cell(index).name, value = %value, "resolved");
        self.pool.cell_mut(index).value = value;
        self.resolved[index] = true;
        Ok(())
    }

    fn resolve_value(&mut self, index: usize) -> Result<String, CalcError> {
        let cell = self.pool.cell(index);
        let mut text = cell.value.clone();
        let parts = cell.parts.clone();

        if parts.is_empty() {
            text = self.substitute_marking(&text);
            let mut scans = 0;
            while let Some(other) = self.next_named(index, &text) {
                if scans >= self.limits.name_scan {
                    tracing::warn!(
                        cell = %self.pool.cell(index).name,
                        limit = self.limits.name_scan,
                        "name substitution limit reached"
                    );
                    break;
                }
                scans += 1;
                self.resolve(other)?;
                let dep = self.pool.cell(other);
                text = substitute_placeholder(&text, &dep.name, &dep.value);
            }
        } else {
            for part in &parts {
                match self.pool.index_of(part) {
                    Some(child) => {
                        self.resolve(child)?;
                        let dep = self.pool.cell(child);
                        text = substitute_placeholder(&text, &dep.name, &dep.value);
                    }
                    None => tracing::warn!(
                        cell = %self.pool.cell(index).name,
                        part = %part,
                        "dangling part reference ignored"
                    ),
                }
            }
            text = self.substitute_marking(&text);
        }

        let mut value = self.finalize(&text)?;

        let cell = self.pool.cell(index);
        if cell.is_coating() && unquote(&value).is_empty() {
            if let Some(coating) = &self.marking.coating {
                value = format!("'{}'", coating);
            }
        }
        Ok(value)
    }

    /// First other cell whose placeholder occurs in `text`
    fn next_named(&self, index: usize, text: &str) -> Option<usize> {
        if !text.contains('[') {
            return None;
        }
        self.pool
            .cells()
            .iter()
            .enumerate()
            .find(|(i, c)| *i != index && !c.name.is_empty() && text.contains(&c.placeholder()))
            .map(|(i, _)| i)
    }

    fn substitute_marking(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (name, value) in &self.marking.attributes {
            out = substitute_placeholder(&out, name, value);
        }
        out
    }

    /// Evaluate substituted text; text that is not an expression, a
    /// negative literal, or that fails to evaluate is kept as it is
    pub(crate) fn finalize(&mut self, text: &str) -> Result<String, CalcError> {
        let trimmed = text.trim();
        if trimmed.starts_with('-') && !has_ternary(trimmed) {
            return Ok(text.to_string());
        }
        if !needs_evaluation(trimmed) {
            return Ok(text.to_string());
        }
        match evaluate(trimmed, self) {
            Ok(value) => Ok(value.render()),
            Err(ExprError::Host(err)) => Err(*err),
            Err(err) => {
                tracing::debug!(text = trimmed, error = %err, "kept unevaluated text");
                Ok(text.to_string())
            }
        }
    }

    /// Substitute marking values and resolved cells by name into a field
    fn substitute_fields(&self, text: &str) -> String {
        let mut out = text.to_string();
        for _ in 0..self.limits.substitution_rounds {
            let names: Vec<String> = placeholder_re()
                .captures_iter(&out)
                .map(|c| c[1].to_string())
                .collect();

            let mut changed = false;
            for name in names {
                let value = match self.marking.get(&name) {
                    Some(v) => v.to_string(),
                    None => match self.pool.find_by_name(&name) {
                        Some(i) => self.pool.cell(i).value.clone(),
                        None => continue,
                    },
                };
                let next = substitute_placeholder(&out, &name, &value);
                if next != out {
                    out = next;
                    changed = true;
                }
            }
            if !changed {
                return out;
            }
        }
        if placeholder_re().is_match(&out) {
            tracing::warn!(text, "field substitution limit reached");
        }
        out
    }

    /// Reduce a usage condition to its literal result.
    ///
    /// Returns the literal and whether the condition holds. An empty
    /// condition holds and stays empty; placeholders nothing can fill read
    /// as `0`.
    pub fn evaluate_condition(&mut self, condition: &str) -> Result<(String, bool), CalcError> {
        if condition.trim().is_empty() {
            return Ok((String::new(), true));
        }
        let text = self.substitute_fields(condition);
        let text = placeholder_re().replace_all(&text, "0").into_owned();
        let result = self.finalize(&text)?;
        let result = unquote(&result).to_string();
        let holds = !result.is_empty() && condition_holds(&result);
        Ok((result, holds))
    }

    /// Render a display field (name or designation) to final text.
    ///
    /// Only fields authored as formulas are evaluated; elsewhere `-` and `*`
    /// between substituted numbers are marking separators and stay literal.
    pub fn render_field(&mut self, text: &str) -> Result<String, CalcError> {
        let formula = is_formula(text);
        if !formula && !text.contains('[') {
            return Ok(text.to_string());
        }
        self.render(text, formula)
    }

    /// Substitute and evaluate a standalone formula
    pub fn evaluate_formula(&mut self, text: &str) -> Result<String, CalcError> {
        self.render(text, true)
    }

    fn render(&mut self, text: &str, evaluate: bool) -> Result<String, CalcError> {
        let substituted = self.substitute_fields(text);
        let cleaned = remnant_re().replace_all(&substituted, "").into_owned();
        let result = if evaluate {
            self.finalize(&cleaned)?
        } else {
            cleaned
        };
        Ok(result.replace(EMPTY_LITERAL, "").replace('\'', ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::{CellPool, Limits};
    use crate::engine::lookup::{NoTables, StaticTables};
    use crate::engine::tokenizer::Marking;
    use crate::entities::Cell;

    fn resolve_cells(cells: Vec<Cell>, marking: &Marking) -> Result<Vec<String>, CalcError> {
        let mut ctx = CalcContext::new(CellPool::new(cells), marking, &NoTables, Limits::default());
        ctx.resolve_all()?;
        Ok(ctx.pool().cells().iter().map(|c| c.value.clone()).collect())
    }

    #[test]
    fn test_substitute_placeholder_quoting() {
        assert_eq!(substitute_placeholder("[W]*2", "W", "5"), "5*2");
        assert_eq!(substitute_placeholder("[S] = 'AB'", "S", "AB"), "'AB' = 'AB'");
        assert_eq!(substitute_placeholder("'RAD-[S]'", "S", "'AB'"), "'RAD-AB'");
        assert_eq!(substitute_placeholder("[S] + 'x'", "S", ""), "'' + 'x'");
        assert_eq!(substitute_placeholder("'[S]x'", "S", "''"), "'x'");
        assert_eq!(substitute_placeholder("[S]", "S", "'AB'"), "'AB'");
        assert_eq!(substitute_placeholder("[B] and true", "B", "true"), "true and true");
        assert_eq!(substitute_placeholder("[A]+[A]", "A", "1"), "1+1");
        assert_eq!(substitute_placeholder("no refs", "A", "1"), "no refs");
    }

    #[test]
    fn test_marking_value_times_two() {
        let marking = Marking::from_pairs([("Width", "5")]);
        let values = resolve_cells(vec![Cell::new("Double", "[Width]*2")], &marking).unwrap();
        assert_eq!(values, vec!["10"]);
    }

    #[test]
    fn test_parts_resolved_depth_first() {
        let width = Cell::new("Width", "5");
        let area = Cell::new("Area", "[Width]*[Width]").with_parts([width.id]);
        let total = Cell::new("Total", "[Area] + 1").with_parts([area.id]);
        let values = resolve_cells(vec![total, area, width], &Marking::default()).unwrap();
        assert_eq!(values, vec!["26", "25", "5"]);
    }

    #[test]
    fn test_name_scan_resolves_dependencies_first() {
        let a = Cell::new("A", "[B] + 1");
        let b = Cell::new("B", "[C] * 2");
        let c = Cell::new("C", "3");
        let values = resolve_cells(vec![a, b, c], &Marking::default()).unwrap();
        assert_eq!(values, vec!["7", "6", "3"]);
    }

    #[test]
    fn test_dangling_part_is_ignored() {
        let ghost = Cell::new("Ghost", "1");
        let cell = Cell::new("Sum", "[Ghost] + 1").with_parts([ghost.id]);
        let values = resolve_cells(vec![cell], &Marking::default()).unwrap();
        assert_eq!(values, vec!["[Ghost] + 1"]);
    }

    #[test]
    fn test_parts_cycle_is_an_error() {
        let mut a = Cell::new("A", "[B] + 1");
        let mut b = Cell::new("B", "[A] + 1");
        a.parts.push(b.id);
        b.parts.push(a.id);
        let err = resolve_cells(vec![a, b], &Marking::default()).unwrap_err();
        match err {
            CalcError::Cycle { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_name_cycle_is_an_error() {
        let a = Cell::new("A", "[B]");
        let b = Cell::new("B", "[A]");
        assert!(matches!(
            resolve_cells(vec![a, b], &Marking::default()),
            Err(CalcError::Cycle { .. })
        ));
    }

    #[test]
    fn test_idempotent_without_placeholders() {
        let values = resolve_cells(
            vec![Cell::new("N", "42"), Cell::new("T", "'plain'"), Cell::new("E", "")],
            &Marking::default(),
        )
        .unwrap();
        assert_eq!(values, vec!["42", "'plain'", ""]);
    }

    #[test]
    fn test_negative_literal_kept() {
        let values = resolve_cells(
            vec![
                Cell::new("Suffix", "-01"),
                Cell::new("Pick", "-1 > 0 ? 'a' : 'b'"),
            ],
            &Marking::default(),
        )
        .unwrap();
        assert_eq!(values, vec!["-01", "b"]);
    }

    #[test]
    fn test_malformed_expression_kept() {
        let marking = Marking::from_pairs([("Series", "AB")]);
        let values = resolve_cells(vec![Cell::new("Code", "[Series] * (")], &marking).unwrap();
        assert_eq!(values, vec!["'AB' * ("]);
    }

    #[test]
    fn test_coating_defaults_to_marking() {
        let marking = Marking {
            coating: Some("RAL 9016".to_string()),
            ..Marking::default()
        };
        let values = resolve_cells(
            vec![Cell::new("Coating", ""), Cell::new("Покрытие цвет", "'Black'")],
            &marking,
        )
        .unwrap();
        assert_eq!(values, vec!["'RAL 9016'", "'Black'"]);
    }

    #[test]
    fn test_lookup_failure_aborts() {
        let cell = Cell::new("Mass", "lookup('bolts', 'metric', 'M8', 'mass', false)");
        let err = resolve_cells(vec![cell], &Marking::default()).unwrap_err();
        assert!(matches!(err, CalcError::Lookup(_)));
    }

    #[test]
    fn test_lookup_with_cell_reference_argument() {
        let mut tables = StaticTables::new();
        tables.insert("bolts", "metric", "M8", "mass", &[], "0.02");
        let size = Cell::new("Size", "'M8'");
        let mass = Cell::new(
            "Mass",
            format!("lookup('bolts', 'metric', '{}', 'mass', false) * 100", size.id),
        );
        let marking = Marking::default();
        let mut ctx = CalcContext::new(
            CellPool::new(vec![mass, size]),
            &marking,
            &tables,
            Limits::default(),
        );
        ctx.resolve_all().unwrap();
        assert_eq!(ctx.pool().cells()[0].value, "2");
    }

    #[test]
    fn test_name_scan_limit_terminates() {
        let a = Cell::new("A", "[B]");
        let b = Cell::new("B", "[B]");
        let marking = Marking::default();
        let limits = Limits {
            name_scan: 3,
            substitution_rounds: 10,
        };
        let mut ctx = CalcContext::new(CellPool::new(vec![a, b]), &marking, &NoTables, limits);
        ctx.resolve_all().unwrap();
        assert!(ctx.pool().cells()[0].value.contains("[B]"));
    }

    #[test]
    fn test_conditions() {
        let marking = Marking::from_pairs([("Series", "AB"), ("Height", "500")]);
        let mut ctx = CalcContext::new(CellPool::default(), &marking, &NoTables, Limits::default());

        assert_eq!(ctx.evaluate_condition("").unwrap(), (String::new(), true));
        assert_eq!(
            ctx.evaluate_condition("[Series] = 'AB'").unwrap(),
            ("true".to_string(), true)
        );
        assert!(!ctx.evaluate_condition("[Height] > 600").unwrap().1);
        assert!(!ctx.evaluate_condition("[Missing] > 0").unwrap().1);
        assert!(ctx.evaluate_condition("ИСТИНА").unwrap().1);
    }

    #[test]
    fn test_render_field() {
        let marking = Marking::from_pairs([("Series", "AB"), ("Height", "500")]);
        let cells = vec![Cell::new("Panels", "2")];
        let mut ctx = CalcContext::new(CellPool::new(cells), &marking, &NoTables, Limits::default());

        assert_eq!(ctx.render_field("'RAD-' + [Height]").unwrap(), "RAD-500");
        assert_eq!(ctx.render_field("RAD-[Series]-[Height]").unwrap(), "RAD-AB-500");
        assert_eq!(ctx.render_field("Panel x[Panels]").unwrap(), "Panel x2");
        assert_eq!(ctx.render_field("RAD-[Height]-[Option]").unwrap(), "RAD-500");
        assert_eq!(ctx.render_field("Plain name").unwrap(), "Plain name");
    }

    #[test]
    fn test_render_field_keeps_separators_between_numbers() {
        let marking = Marking::from_pairs([("Dn", "12"), ("Pn", "40"), ("H", "500"), ("L", "1200")]);
        let mut ctx = CalcContext::new(CellPool::default(), &marking, &NoTables, Limits::default());

        assert_eq!(ctx.render_field("[Dn]-[Pn]").unwrap(), "12-40");
        assert_eq!(ctx.render_field("[H]*[L]").unwrap(), "500*1200");
        assert_eq!(ctx.render_field("[H]x[L]").unwrap(), "500x1200");
        assert_eq!(ctx.render_field("'DN' + [Dn]").unwrap(), "DN12");
    }

    #[test]
    fn test_evaluate_formula() {
        let marking = Marking::from_pairs([("H", "500"), ("L", "1200")]);
        let mut ctx = CalcContext::new(CellPool::default(), &marking, &NoTables, Limits::default());

        assert_eq!(ctx.evaluate_formula("[H]*[L]").unwrap(), "600000");
        assert_eq!(ctx.evaluate_formula("[H] / 100").unwrap(), "5");
    }
}
