use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};
use cli::{RunConfig, resolve_program_path};
use color_eyre::eyre::Result;
use shapes::{Halt, Interpreter, ParsedProgram, RunReport};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

const SEPARATOR: &str = "--------------------------------------";

const INTERRUPT_NOTE: &str = "Ctrl-C stops the program after the current step. \
While the program waits for an input line, or for enter between manual steps, \
the stop takes effect once that line is entered.";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and run a program image
    #[command(after_help = INTERRUPT_NOTE)]
    Interpret {
        /// Program image; `.png` is appended when there is no image extension
        path: PathBuf,
        /// Seconds to wait between steps; negative steps on enter
        #[arg(short = 't', long = "time", allow_negative_numbers = true)]
        delay: Option<f64>,
        /// Print every step and the global stack
        #[arg(short, long)]
        verbose: bool,
        /// Write intermediate masks to `debugging/` next to the program
        #[arg(short, long)]
        debug: bool,
        /// TOML or JSON run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Parse a program image and report what was found
    Parse {
        path: PathBuf,
        #[arg(short, long)]
        debug: bool,
        /// Print the shape summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let debug = match &cli.command {
        Commands::Interpret { debug, .. } | Commands::Parse { debug, .. } => *debug,
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if debug { "info" } else { "warn" })),
        )
        .init();

    match cli.command {
        Commands::Interpret {
            path,
            delay,
            verbose,
            debug,
            config,
        } => {
            let file_config = match config {
                Some(config) => RunConfig::from_file(config)?,
                None => RunConfig::default(),
            };
            let run_config = file_config.merge_flags(delay, verbose, debug);
            interpret(&resolve_program_path(&path), run_config).await?;
        }
        Commands::Parse { path, debug, json } => {
            let program = parse_timed(&resolve_program_path(&path), debug)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&program.graph.summaries())?);
            } else {
                print_summary(&program);
            }
        }
    }

    Ok(())
}

fn parse_timed(path: &Path, debug: bool) -> Result<ParsedProgram> {
    println!("|parsing {}...|", path.display());
    let started = Instant::now();
    let program = shapes::parse(path, debug)?;
    println!("|parsed! {:.3} seconds elapsed|", started.elapsed().as_secs_f64());
    Ok(program)
}

fn print_summary(program: &ParsedProgram) {
    let summaries = program.graph.summaries();
    println!("|shapes found: {}|", summaries.len());
    for shape in summaries {
        let targets: Vec<String> = shape
            .connections
            .iter()
            .flat_map(|c| c.targets.iter().map(|t| t.to_string()))
            .collect();
        println!(
            "|{}: {} at ({}, {}), holes {:?}, -> [{}]|",
            shape.id,
            shape.opcode,
            shape.center[0],
            shape.center[1],
            shape.hole_sides,
            targets.join(", ")
        );
    }
}

async fn interpret(path: &Path, run_config: RunConfig) -> Result<()> {
    let program = parse_timed(path, run_config.debug)?;
    if run_config.debug {
        print_summary(&program);
    }
    println!("{SEPARATOR}");
    io::stdout().flush()?;

    let config = run_config.interpreter_config(program.home_dir.clone());
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    let mut running = tokio::task::spawn_blocking(move || {
        Interpreter::new(program.graph, config, io::stdin().lock(), io::stdout())?
            .with_cancel_flag(flag)
            .run()
    });

    let report = tokio::select! {
        joined = &mut running => joined?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("Interrupted, stopping after the current step");
            cancel.store(true, Ordering::SeqCst);
            running.await?
        }
    }?;

    finish(&report)
}

/// An interrupted run is still a clean exit.
fn finish(report: &RunReport) -> Result<()> {
    if report.halt == Halt::Aborted {
        warn!(steps = report.steps, "Program aborted");
    } else {
        info!(halt = ?report.halt, steps = report.steps, "Program finished");
    }
    Ok(())
}
