//! Built-in functions callable from formula text

use crate::engine::error::CalcError;
use crate::engine::expr::{parse_number, split_range, ExprError, Value};
use crate::engine::lookup::{LookupError, LookupRequest};

/// Services a function call may need from the running calculation
pub trait FunctionHost {
    /// Resolve `text` when it is the id of a cell in the calculation scope.
    /// Returns `None` when it is not a cell reference.
    fn resolve_reference(&mut self, text: &str) -> Result<Option<String>, CalcError>;

    /// Delegate a table lookup to the external collaborator
    fn lookup(&mut self, request: &LookupRequest) -> Result<String, CalcError>;
}

/// Host without cells or tables
pub struct NullHost;

impl FunctionHost for NullHost {
    fn resolve_reference(&mut self, _text: &str) -> Result<Option<String>, CalcError> {
        Ok(None)
    }

    fn lookup(&mut self, _request: &LookupRequest) -> Result<String, CalcError> {
        Err(LookupError::NotConfigured.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Floor,
    Round,
    Ceiling,
    Abs,
    Sqrt,
    Min,
    Max,
    Avg,
    IsEven,
    IsNumber,
    Contains,
    Equals,
    InRange,
    Lookup,
}

impl Function {
    /// Canonical (case-insensitive) function names
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name.to_lowercase().as_str() {
            "floor" => Function::Floor,
            "round" => Function::Round,
            "ceiling" | "ceil" => Function::Ceiling,
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "min" => Function::Min,
            "max" => Function::Max,
            "avg" | "average" => Function::Avg,
            "iseven" => Function::IsEven,
            "isnumber" => Function::IsNumber,
            "contains" => Function::Contains,
            "equals" => Function::Equals,
            "inrange" => Function::InRange,
            "lookup" => Function::Lookup,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Floor => "floor",
            Function::Round => "round",
            Function::Ceiling => "ceiling",
            Function::Abs => "abs",
            Function::Sqrt => "sqrt",
            Function::Min => "min",
            Function::Max => "max",
            Function::Avg => "avg",
            Function::IsEven => "iseven",
            Function::IsNumber => "isnumber",
            Function::Contains => "contains",
            Function::Equals => "equals",
            Function::InRange => "inrange",
            Function::Lookup => "lookup",
        }
    }
}

/// Call a built-in with already-evaluated arguments
pub fn call(
    function: Function,
    args: Vec<Value>,
    host: &mut dyn FunctionHost,
) -> Result<Value, ExprError> {
    let name = function.name();
    match function {
        Function::Floor => Ok(Value::Number(single_number(name, &args)?.floor())),
        Function::Ceiling => Ok(Value::Number(single_number(name, &args)?.ceil())),
        Function::Abs => Ok(Value::Number(single_number(name, &args)?.abs())),
        Function::Sqrt => {
            let n = single_number(name, &args)?;
            if n < 0.0 {
                return Err(ExprError::Math(format!("sqrt of negative number {}", n)));
            }
            Ok(Value::Number(n.sqrt()))
        }
        Function::Round => {
            if args.is_empty() || args.len() > 2 {
                return Err(ExprError::arity(name, "1 or 2", args.len()));
            }
            let n = number_arg(name, &args[0])?;
            let digits = match args.get(1) {
                Some(d) => number_arg(name, d)?.clamp(0.0, 10.0) as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            Ok(Value::Number((n * factor).round() / factor))
        }
        Function::Min | Function::Max | Function::Avg => {
            if args.is_empty() {
                return Err(ExprError::arity(name, "at least 1", 0));
            }
            let numbers = args
                .iter()
                .map(|a| number_arg(name, a))
                .collect::<Result<Vec<_>, _>>()?;
            let result = match function {
                Function::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
                Function::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                _ => numbers.iter().sum::<f64>() / numbers.len() as f64,
            };
            Ok(Value::Number(result))
        }
        Function::IsEven => {
            let n = single_number(name, &args)?;
            Ok(Value::Bool(n.fract() == 0.0 && (n as i64) % 2 == 0))
        }
        Function::IsNumber => {
            expect_arity(name, &args, 1)?;
            let result = match &args[0] {
                Value::Number(_) => true,
                Value::Text(s) => parse_number(s).is_some(),
                Value::Bool(_) | Value::Null => false,
            };
            Ok(Value::Bool(result))
        }
        Function::Contains => {
            expect_arity(name, &args, 2)?;
            Ok(Value::Bool(args[0].to_text().contains(&args[1].to_text())))
        }
        Function::Equals => {
            expect_arity(name, &args, 2)?;
            Ok(Value::Bool(
                args[0].to_text().trim() == args[1].to_text().trim(),
            ))
        }
        Function::InRange => {
            if args.len() < 2 {
                return Err(ExprError::arity(name, "at least 2", args.len()));
            }
            let needle = args[0].to_text();
            let lists: Vec<String> = args[1..].iter().map(Value::to_text).collect();
            Ok(Value::Bool(in_member_lists(&needle, lists.iter().map(String::as_str))))
        }
        Function::Lookup => table_lookup(args, host),
    }
}

fn expect_arity(name: &str, args: &[Value], n: usize) -> Result<(), ExprError> {
    if args.len() != n {
        return Err(ExprError::arity(name, n.to_string(), args.len()));
    }
    Ok(())
}

fn number_arg(name: &str, v: &Value) -> Result<f64, ExprError> {
    v.as_number().ok_or_else(|| {
        ExprError::Type(format!("{}() needs numbers, got '{}'", name, v.to_text()))
    })
}

fn single_number(name: &str, args: &[Value]) -> Result<f64, ExprError> {
    expect_arity(name, args, 1)?;
    number_arg(name, &args[0])
}

/// Whether `needle` is listed in any membership list: `1-3, 7` holds
/// 1, 2, 3 and 7.
///
/// Tokens are separated by commas, semicolons or whitespace; an integer
/// `start-end` token stands for every integer in between.
pub fn in_member_lists<'a>(needle: &str, lists: impl IntoIterator<Item = &'a str>) -> bool {
    lists.into_iter().any(|list| {
        list.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .any(|token| token_matches(token, needle))
    })
}

fn token_matches(token: &str, needle: &str) -> bool {
    match parse_int_range(token) {
        Some((lo, hi)) => parse_number(needle)
            .is_some_and(|n| n.fract() == 0.0 && lo as f64 <= n && n <= hi as f64),
        None => member_matches(token, needle),
    }
}

fn parse_int_range(token: &str) -> Option<(i64, i64)> {
    let (lo, hi) = split_range(token)?;
    let lo: i64 = lo.trim().parse().ok()?;
    let hi: i64 = hi.trim().parse().ok()?;
    Some((lo.min(hi), lo.max(hi)))
}

fn member_matches(member: &str, needle: &str) -> bool {
    match (parse_number(member), parse_number(needle)) {
        (Some(a), Some(b)) => a == b,
        _ => member == needle.trim(),
    }
}

fn table_lookup(args: Vec<Value>, host: &mut dyn FunctionHost) -> Result<Value, ExprError> {
    if args.len() < 5 {
        return Err(CalcError::from(LookupError::MissingArgument(format!(
            "lookup needs table, sheet, row, column and range flag; got {} argument(s)",
            args.len()
        )))
        .into());
    }

    // Arguments may be ids of cells that have not been resolved yet
    let mut resolved = Vec::with_capacity(args.len());
    for arg in &args {
        let text = arg.to_text();
        match host.resolve_reference(&text)? {
            Some(value) => resolved.push(Value::Text(value.trim_matches('\'').to_string())),
            None => resolved.push(arg.clone()),
        }
    }

    let flag = &resolved[resolved.len() - 1];
    let range = flag
        .as_bool()
        .or_else(|| flag.as_number().map(|n| n != 0.0))
        .ok_or_else(|| {
            CalcError::from(LookupError::InvalidArgument(format!(
                "range flag must be true/false, got '{}'",
                flag.to_text()
            )))
        })?;

    let required = ["table", "sheet", "row", "column"];
    let mut keys = Vec::with_capacity(4);
    for (value, what) in resolved.iter().zip(required) {
        let text = value.to_text().trim().to_string();
        if text.is_empty() {
            return Err(CalcError::from(LookupError::MissingArgument(what.to_string())).into());
        }
        keys.push(text);
    }

    let request = LookupRequest {
        table: keys[0].clone(),
        sheet: keys[1].clone(),
        row: keys[2].clone(),
        column: keys[3].clone(),
        filters: resolved[4..resolved.len() - 1]
            .iter()
            .map(Value::to_text)
            .collect(),
        range,
    };

    let result = host.lookup(&request)?;
    Ok(match parse_number(&result) {
        Some(n) => Value::Number(n),
        None => Value::Text(result),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expr::evaluate;
    use crate::engine::lookup::{StaticTables, TableLookup};

    /// Host backed by static tables, with one pretend cell reference
    struct TableHost {
        tables: StaticTables,
        seen: Vec<LookupRequest>,
    }

    impl FunctionHost for TableHost {
        fn resolve_reference(&mut self, text: &str) -> Result<Option<String>, CalcError> {
            Ok((text == "CELL-REF").then(|| "'M8'".to_string()))
        }

        fn lookup(&mut self, request: &LookupRequest) -> Result<String, CalcError> {
            self.seen.push(request.clone());
            Ok(self.tables.lookup(request)?)
        }
    }

    fn host() -> TableHost {
        let mut tables = StaticTables::new();
        tables.insert("bolts", "metric", "M8", "length", &[], "40");
        tables.insert("bolts", "metric", "M8", "grade", &["zinc"], "8.8");
        TableHost {
            tables,
            seen: Vec::new(),
        }
    }

    fn eval_str(text: &str) -> Result<Value, ExprError> {
        evaluate(text, &mut NullHost)
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(eval_str("floor(2.7)").unwrap(), Value::Number(2.0));
        assert_eq!(eval_str("ОКРВВЕРХ(2.1)").unwrap(), Value::Number(3.0));
        assert_eq!(eval_str("round(2.346, 2)").unwrap(), Value::Number(2.35));
        assert_eq!(eval_str("round(2.5)").unwrap(), Value::Number(3.0));
        assert_eq!(eval_str("abs(-4)").unwrap(), Value::Number(4.0));
        assert_eq!(eval_str("sqrt(16)").unwrap(), Value::Number(4.0));
        assert!(matches!(eval_str("sqrt(-1)"), Err(ExprError::Math(_))));
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(eval_str("min(3, 1, 2)").unwrap(), Value::Number(1.0));
        assert_eq!(eval_str("МАКС(3; 1; 2)").unwrap(), Value::Number(3.0));
        assert_eq!(eval_str("avg(1, 2, 3, 4)").unwrap(), Value::Number(2.5));
        assert!(matches!(eval_str("min()"), Err(ExprError::Arity { .. })));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(eval_str("iseven(4)").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("iseven(3)").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("iseven(2.5)").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("isnumber('12')").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("isnumber('AB')").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("contains('RAL9016', 'RAL')").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("СОДЕРЖИТ('AB', 'C')").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("equals(' AB', 'AB ')").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_in_range() {
        assert_eq!(eval_str("inrange(3, '1-5')").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("inrange(7, '1-5, 8')").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("inrange(8, '1-5; 8', '10')").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("inrange('AB', 'AA AB')").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("ДИАПАЗОН(4, '5-3')").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_member_lists() {
        assert!(in_member_lists("2", ["1-3, 7"]));
        assert!(in_member_lists("7", ["1-3, 7"]));
        assert!(!in_member_lists("2.5", ["1-3"]));
        assert!(!in_member_lists("4", ["1-3", "7"]));
    }

    #[test]
    fn test_wide_and_negative_ranges() {
        assert_eq!(
            eval_str("inrange(5, '0-10000000000')").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval_str("inrange(-3, '-5-5')").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("inrange(6, '-5-5')").unwrap(), Value::Bool(false));
        assert_eq!(eval_str("inrange(-7, '-10--5')").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_lookup_exact() {
        let mut host = host();
        let value = evaluate("lookup('bolts', 'metric', 'M8', 'length', false)", &mut host).unwrap();
        assert_eq!(value, Value::Number(40.0));
        assert!(!host.seen[0].range);
        assert!(host.seen[0].filters.is_empty());
    }

    #[test]
    fn test_lookup_with_filters_and_reference() {
        let mut host = host();
        let value =
            evaluate("ТАБЛИЦА('bolts', 'metric', 'CELL-REF', 'grade', 'zinc', 0)", &mut host)
                .unwrap();
        assert_eq!(value, Value::Number(8.8));
        assert_eq!(host.seen[0].row, "M8");
        assert_eq!(host.seen[0].filters, vec!["zinc".to_string()]);
    }

    #[test]
    fn test_lookup_argument_errors_are_fatal() {
        let mut host = host();
        let err = evaluate("lookup('bolts', 'metric', 'M8', false)", &mut host).unwrap_err();
        assert!(matches!(err, ExprError::Host(_)));

        let err = evaluate("lookup('bolts', '', 'M8', 'length', false)", &mut host).unwrap_err();
        assert!(matches!(err, ExprError::Host(_)));

        let err =
            evaluate("lookup('bolts', 'metric', 'M8', 'length', 'maybe')", &mut host).unwrap_err();
        assert!(matches!(err, ExprError::Host(_)));
    }

    #[test]
    fn test_lookup_without_tables_is_fatal() {
        let err = eval_str("lookup('a', 'b', 'c', 'd', false)").unwrap_err();
        assert!(matches!(err, ExprError::Host(_)));
    }
}
