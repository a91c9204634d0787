//! prepost - balanced pre/post assessment pair selection
//!
//! Reads an item catalog from CSV, searches for a comparable pre/post pair
//! and writes the assignment to CSV.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use u_prepost::io::{read_catalog, write_assignment};
use u_prepost::item::{PairedSet, Tally};
use u_prepost::job::JobConfig;
use u_prepost::log::StdoutSink;
use u_prepost::optimizer::PairOptimizer;
use u_prepost::{PairError, Result};

const FULL_HELP: &str = include_str!("../../README.md");

#[derive(Parser, Debug)]
#[command(name = "prepost", version, about = "Assign comparable pre/post assessment item sets")]
struct Cli {
    /// Item catalog (.csv)
    #[arg(required_unless_present_any = ["json", "fullhelp"])]
    input: Option<PathBuf>,

    /// Output file (.csv)
    #[arg(required_unless_present_any = ["json", "fullhelp"])]
    output: Option<PathBuf>,

    /// JSON job file with options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Progress detail, 0 to 3 (overrides the job file)
    #[arg(short, long)]
    verbosity: Option<u8>,

    /// Write the default options to JSON, then exit
    #[arg(short, long, value_name = "JSON")]
    json: Option<PathBuf>,

    /// Print the full description, then exit
    #[arg(short = 'H', long)]
    fullhelp: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.fullhelp {
        println!("{FULL_HELP}");
        return Ok(());
    }
    if let Some(path) = &cli.json {
        JobConfig::write_defaults(path)?;
        println!("defaults written to {}", path.display());
        return Ok(());
    }
    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        return Err(PairError::InvalidConfig("input and output paths are required".into()));
    };

    let job = JobConfig::load_or_default(cli.config.as_deref())?.with_verbosity_override(cli.verbosity);
    job.validate()?;
    let verbosity = job.optimizer.verbosity;

    let catalog = read_catalog(input, &job.layout, None)?;
    if verbosity > 0 {
        println!("\nItem catalog read from {}\n", input.display());
    }

    let mut optimizer = PairOptimizer::new(Arc::new(catalog), job.optimizer.clone())?.with_logger(StdoutSink);
    if job.n_runs < 2 {
        optimizer.run()?;
    } else {
        optimizer.run_multiple(job.n_runs)?;
    }

    let best = optimizer.best().ok_or(PairError::NoResult("best pair"))?;
    let pair = best.export();

    if verbosity > 0 {
        print_summary(best, verbosity);
    }

    let now = chrono::Local::now().naive_local();
    write_assignment(output, &pair, job.write_mode, &now)?;

    if verbosity > 0 {
        println!("\nAssigned pair {} to {}\n", job.write_mode.verb(), output.display());
    }
    Ok(())
}

fn print_summary(best: &PairedSet, verbosity: u8) {
    let report = best.summary_report();

    println!();
    if verbosity == 2 {
        println!("pre: {:?}", best.pre().export());
        println!("post: {:?}", best.post().export());
    }
    println!("Number of sub-parts: ({}, {})", report.subparts[0], report.subparts[1]);
    println!(
        "Proportion of T's: ({}, {})",
        ratio(report.true_ratio[0]),
        ratio(report.true_ratio[1])
    );

    if verbosity > 1 {
        println!("Category counts:");
        println!("pre: {}", tally(&report.categories[0]));
        println!("post: {}", tally(&report.categories[1]));
        println!("Sub-category counts:");
        println!("pre: {}", tally(&report.subcategories[0]));
        println!("post: {}", tally(&report.subcategories[1]));
    }
}

fn ratio(r: Option<f64>) -> String {
    r.map(|r| format!("{r:.2}")).unwrap_or_else(|| "n/a".into())
}

fn tally(t: &Tally) -> String {
    serde_json::to_string(t).unwrap_or_default()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
