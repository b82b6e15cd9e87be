//! `bomcalc tokenize` command - show what the tokenizer reads from a marking

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{load_template, Config};
use crate::engine::{Calculator, Marking, NoTables};

#[derive(clap::Args, Debug)]
pub struct TokenizeArgs {
    /// Template file (*.tpl.yaml)
    pub template: PathBuf,

    /// Order marking to read
    #[arg(long, short = 'm')]
    pub marking: String,
}

pub fn run(args: TokenizeArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let template = load_template(&args.template)?;
    let marking = Calculator::new(&NoTables).tokenize(&template, &args.marking)?;

    let format = global
        .format
        .resolve(config.default_format.as_deref(), OutputFormat::Table);
    match format {
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&marking).into_diagnostic()?),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&marking).into_diagnostic()?)
        }
        _ => print!("{}", render_marking(&marking, global.quiet)),
    }
    Ok(())
}

fn render_marking(marking: &Marking, quiet: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Attribute", "Value"]);
    for (name, value) in &marking.attributes {
        builder.push_record([name.as_str(), value.as_str()]);
    }

    let mut out = String::new();
    if !quiet {
        out.push_str(&format!("{} {}\n\n", style("example:").dim(), marking.example));
    }
    out.push_str(&builder.build().with(Style::markdown()).to_string());
    out.push('\n');
    if let Some(coating) = &marking.coating {
        out.push_str(&format!("\n{} {}\n", style("coating:").dim(), coating));
    }
    out
}
