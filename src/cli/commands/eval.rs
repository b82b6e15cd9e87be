//! `bomcalc eval` command - evaluate one formula against ad-hoc values

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::helpers::open_tables;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::{CalcContext, CellPool, Marking};

#[derive(clap::Args, Debug)]
pub struct EvalArgs {
    /// Formula text, e.g. "[Height] > 400 ? 0 : 2"
    pub expression: String,

    /// Attribute value available as [NAME] (repeatable)
    #[arg(long = "set", short = 's', value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Directory of CSV lookup tables (default: config `tables_dir`)
    #[arg(long)]
    pub tables: Option<PathBuf>,
}

#[derive(Serialize)]
struct EvalOutput<'a> {
    expression: &'a str,
    result: String,
}

fn parse_assignment(text: &str) -> Result<(String, String), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", text))?;
    let name = name.trim().trim_start_matches('[').trim_end_matches(']');
    if name.is_empty() {
        return Err(format!("empty attribute name in '{}'", text));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub fn run(args: EvalArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let tables = open_tables(args.tables.as_deref(), &config);
    let marking = Marking::from_pairs(args.set);

    let mut ctx = CalcContext::new(CellPool::default(), &marking, tables.as_ref(), config.limits());
    let result = ctx.evaluate_formula(&args.expression)?;

    let output = EvalOutput {
        expression: &args.expression,
        result,
    };
    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?)
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&output).into_diagnostic()?),
        _ => println!("{}", output.result),
    }
    Ok(())
}
