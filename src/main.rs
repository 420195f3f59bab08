use anyhow::{Context, Result};
use benchdiff::{
    benchmarks::{OutputOptions, RunResult},
    config::{load_config, ConfigOverrides},
    error::DiffError,
};

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const EXIT_FAILURE: i32 = 1;
const EXIT_RESTORE_FAILED: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Run go benchmarks on the worktree and on a base ref, then report the statistically significant differences"
)]
struct Cli {
    /// Config file, defaults to benchdiff.yml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show git and benchmark commands as they run
    #[arg(long)]
    debug: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = load_config(cli.config.as_deref(), &cli.overrides)?;

    // Ctrl-C reaches the benchmark process too; keep this process alive so the worktree is restored
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::SeqCst) {
            warn!("Interrupted, stopping after the current step");
        }
    })
    .context("Failed to install interrupt handler")?;

    let mut benchdiff = config.benchdiff(Arc::clone(&interrupted))?;
    let options = config.output_options();

    let code = match benchdiff.run() {
        Ok(result) => {
            write_result(&result, &options)?;
            if result.has_degraded_result(config.tolerance) {
                warn!(
                    "Degraded by {:.2}%, more than the {}% tolerance",
                    result.max_degraded_pct(),
                    config.tolerance
                );
                i32::from(config.on_degrade)
            } else {
                info!("No degradation beyond {}%", config.tolerance);
                0
            }
        }
        Err(mut err) => {
            if let Some(result) = err.take_salvaged() {
                write_result(&result, &options)?;
            }
            report(&err);
            if err.is_restore_failure() {
                EXIT_RESTORE_FAILED
            } else if matches!(err, DiffError::Interrupted { .. })
                || interrupted.load(Ordering::SeqCst)
            {
                EXIT_INTERRUPTED
            } else {
                EXIT_FAILURE
            }
        }
    };

    process::exit(code);
}

fn write_result(result: &RunResult, options: &OutputOptions) -> Result<()> {
    let mut stdout = io::stdout().lock();
    result.write_output(&mut stdout, options)?;
    stdout.flush().context("Failed to flush output")
}

fn report(err: &DiffError) {
    error!("{err}");
    if err.is_restore_failure() {
        if let Some(cause) = std::error::Error::source(err) {
            error!("Caused by: {cause}");
        }
    }
}
