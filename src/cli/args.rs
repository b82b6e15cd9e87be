//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    calc::CalcArgs, completions::CompletionsArgs, eval::EvalArgs, tokenize::TokenizeArgs,
    validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "bomcalc")]
#[command(author, version, about = "Template calculation engine for configurable bills of material")]
#[command(long_about = "Calculates a product template for an order marking: picks the matching \
configuration variant, resolves every formula and prunes the parts the order does not use.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Calculate a template for an order marking
    Calc(CalcArgs),

    /// Show the attributes read from an order marking
    Tokenize(TokenizeArgs),

    /// Evaluate a formula against ad-hoc attribute values
    Eval(EvalArgs),

    /// Validate template files (YAML syntax, schema and structure)
    Validate(ValidateArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pick a format for the command (tree for calc, table for tokenize)
    #[default]
    Auto,
    /// Indented BOM tree
    Tree,
    /// Markdown table
    Table,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
}

impl OutputFormat {
    /// Resolve `auto` against a configured default, then a command default
    pub fn resolve(self, configured: Option<&str>, fallback: OutputFormat) -> OutputFormat {
        if self != OutputFormat::Auto {
            return self;
        }
        configured
            .and_then(|name| OutputFormat::from_str(name, true).ok())
            .filter(|format| *format != OutputFormat::Auto)
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_resolve() {
        assert_eq!(
            OutputFormat::Json.resolve(Some("yaml"), OutputFormat::Tree),
            OutputFormat::Json
        );
        assert_eq!(
            OutputFormat::Auto.resolve(Some("YAML"), OutputFormat::Tree),
            OutputFormat::Yaml
        );
        assert_eq!(
            OutputFormat::Auto.resolve(Some("bogus"), OutputFormat::Tree),
            OutputFormat::Tree
        );
        assert_eq!(OutputFormat::Auto.resolve(None, OutputFormat::Table), OutputFormat::Table);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "bomcalc", "calc", "radiator.tpl.yaml", "--marking", "AB-500x1200", "-f", "json",
        ])
        .unwrap();
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Calc(_)));
    }
}
