//! `bomcalc validate` command - validate template files

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::core::{expand_paths, parse_template};
use crate::schema::registry::SchemaRegistry;
use crate::schema::structure::check_structure;
use crate::schema::validator::Validator;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Files or directories to validate (default: current directory)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Strict mode - warnings become errors
    #[arg(long)]
    pub strict: bool,

    /// Continue validation after first failing file
    #[arg(long)]
    pub keep_going: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

/// Validation statistics
#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
    total_warnings: usize,
}

/// Outcome of validating one file
enum FileOutcome {
    Passed,
    Warnings(Vec<String>),
    Failed(usize),
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let registry = SchemaRegistry::default();
    let validator = Validator::new(&registry);

    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths.clone()
    };
    let files = expand_paths(&paths);

    let mut stats = ValidationStats::default();
    let mut had_error = false;

    println!("{} Validating {} file(s)...\n", style("→").blue(), files.len());

    for path in &files {
        stats.files_checked += 1;

        match validate_file(&validator, path, args.summary) {
            FileOutcome::Passed => {
                stats.files_passed += 1;
                if !args.summary {
                    println!("{} {}", style("✓").green(), path.display());
                }
            }
            FileOutcome::Warnings(warnings) => {
                stats.total_warnings += warnings.len();
                if !args.summary {
                    println!(
                        "{} {} - {} warning(s)",
                        style("!").yellow(),
                        path.display(),
                        warnings.len()
                    );
                    for warning in &warnings {
                        println!("    {}", style(warning).yellow());
                    }
                }
                if args.strict {
                    stats.files_failed += 1;
                    had_error = true;
                    if !args.keep_going {
                        break;
                    }
                } else {
                    stats.files_passed += 1;
                }
            }
            FileOutcome::Failed(errors) => {
                stats.files_failed += 1;
                stats.total_errors += errors;
                had_error = true;
                if !args.keep_going {
                    break;
                }
            }
        }
    }

    print_summary(&stats);

    if had_error {
        if stats.files_failed == 1 {
            Err(miette::miette!("Validation failed: 1 file has errors"))
        } else {
            Err(miette::miette!(
                "Validation failed: {} files have errors",
                stats.files_failed
            ))
        }
    } else {
        println!("{} All files passed validation!", style("✓").green().bold());
        Ok(())
    }
}

fn validate_file(validator: &Validator, path: &Path, summary: bool) -> FileOutcome {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if !summary {
                println!("{} {} - {}", style("✗").red(), path.display(), e);
            }
            return FileOutcome::Failed(1);
        }
    };
    let filename = path.display().to_string();

    // Schema first: it reports every violation with its location
    if let Err(e) = validator.iter_errors(&content, &filename) {
        let count = e.violation_count();
        if !summary {
            println!("{} {} - {} error(s)", style("✗").red(), path.display(), count);
            println!("{:?}", miette::Report::new(e));
        }
        return FileOutcome::Failed(count);
    }

    let template = match parse_template(&content, &filename) {
        Ok(t) => t,
        Err(e) => {
            if !summary {
                println!("{} {}", style("✗").red(), path.display());
                println!("{:?}", miette::Report::new(e));
            }
            return FileOutcome::Failed(1);
        }
    };

    let issues = check_structure(&template);
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| i.message.clone())
        .collect();
    let warnings: Vec<String> = issues
        .iter()
        .filter(|i| !i.is_error())
        .map(|i| i.message.clone())
        .collect();

    if !errors.is_empty() {
        if !summary {
            println!(
                "{} {} - {} error(s)",
                style("✗").red(),
                path.display(),
                errors.len()
            );
            for error in &errors {
                println!("    {}", style(error).red());
            }
            for warning in &warnings {
                println!("    {}", style(warning).yellow());
            }
        }
        return FileOutcome::Failed(errors.len());
    }

    if warnings.is_empty() {
        FileOutcome::Passed
    } else {
        FileOutcome::Warnings(warnings)
    }
}

fn print_summary(stats: &ValidationStats) {
    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    println!("  Total errors:   {}", style(stats.total_errors).red());
    if stats.total_warnings > 0 {
        println!("  Total warnings: {}", style(stats.total_warnings).yellow());
    }
    println!();
}
