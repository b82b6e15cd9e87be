//! `bomcalc calc` command - calculate a template for an order marking

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{open_tables, render_table, render_tree, write_output};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{load_template, Config};
use crate::engine::Calculator;

#[derive(clap::Args, Debug)]
pub struct CalcArgs {
    /// Template file (*.tpl.yaml)
    pub template: PathBuf,

    /// Order marking to calculate for (e.g. "AB-500x1200 RAL 9016")
    #[arg(long, short = 'm')]
    pub marking: String,

    /// Production branch (default: config `default_branch`)
    #[arg(long, short = 'b')]
    pub branch: Option<String>,

    /// Directory of CSV lookup tables (default: config `tables_dir`)
    #[arg(long)]
    pub tables: Option<PathBuf>,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: CalcArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let template = load_template(&args.template)?;
    let branch = args.branch.unwrap_or_else(|| config.branch());

    let tables = open_tables(args.tables.as_deref(), &config);
    let calculator = Calculator::new(tables.as_ref()).with_limits(config.limits());
    let calculation = calculator.calculate(&template, &args.marking, &branch)?;

    if calculation.relation().is_none() && !global.quiet {
        tracing::warn!(order = %args.marking, "no relation applies to this order");
    }

    let format = global
        .format
        .resolve(config.default_format.as_deref(), OutputFormat::Tree);
    let content = match format {
        OutputFormat::Auto | OutputFormat::Tree => render_tree(&calculation),
        OutputFormat::Table => render_table(&calculation),
        OutputFormat::Yaml => serde_yml::to_string(&calculation).into_diagnostic()?,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&calculation).into_diagnostic()?;
            json.push('\n');
            json
        }
    };

    write_output(&content, args.output, global.quiet)
}
