use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dtsmerge_bundle::Config;
use log::{debug, info};
use std::io::{BufWriter, Write};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "dtsmerge")]
#[command(about = "Bundle TypeScript declaration files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Merge declaration entry points, leaving dependencies as external imports
    Build(Config),
}

fn main() -> Result<()> {
    env_logger::init();

    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(std::io::stdout());

    let cli = Cli::parse();
    debug!("Parsed CLI arguments: {:?}", cli.command);

    let start = Instant::now();

    match cli.command {
        Commands::Build(mut cfg) => {
            cfg.initialize()?;
            let base = std::env::current_dir().context("Failed to read the current directory")?;
            let num_threads = rayon::current_num_threads();
            info!("Running build (using {} threads)", num_threads);
            debug!("Config: inputs={:?}, external={:?}", cfg.inputs, cfg.external);

            let output = match dtsmerge_bundle::run_build(&cfg) {
                Ok(output) => output,
                Err(e) => {
                    stdout.flush()?;
                    let mut stderr = BufWriter::new(std::io::stderr());
                    dtsmerge_bundle::print_error(&mut stderr, &e, &base)?;

                    // Non-zero exit to fail CI
                    std::process::exit(1);
                }
            };
            debug!("Built {} outputs", output.outputs.len());

            if cfg.json {
                serde_json::to_writer_pretty(&mut stdout, &output)?;
                writeln!(stdout)?;
                stdout.flush()?;
                return Ok(());
            }

            dtsmerge_bundle::print_report(&mut stdout, &output, &base)?;
            writeln!(
                stdout,
                "{} Finished in {}ms on {} entry points (using {} threads).",
                "●".bright_blue(),
                start.elapsed().as_millis().to_string().cyan(),
                output.outputs.len().to_string().cyan(),
                num_threads.to_string().cyan()
            )?;
            stdout.flush()?;

            Ok(())
        }
    }
}
