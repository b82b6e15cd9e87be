use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use bomcalc::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) so piping to
    // `head` or `grep -q` does not panic on a broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(global.verbose);

    match cli.command {
        Commands::Calc(args) => bomcalc::cli::commands::calc::run(args, &global),
        Commands::Tokenize(args) => bomcalc::cli::commands::tokenize::run(args, &global),
        Commands::Eval(args) => bomcalc::cli::commands::eval::run(args, &global),
        Commands::Validate(args) => bomcalc::cli::commands::validate::run(args),
        Commands::Completions(args) => bomcalc::cli::commands::completions::run(args),
    }
}

/// Log to stderr; `BOMCALC_LOG` takes EnvFilter directives, `--verbose`
/// overrides it with `debug`
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("bomcalc=debug")
    } else {
        EnvFilter::try_from_env("BOMCALC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
