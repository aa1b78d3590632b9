use std::process::ExitCode;

use clap::Parser;
use cm_batch::{run, Cli};
use cm_common::{logging, MatcherConfig};
use dotenvy::dotenv;

fn main() -> ExitCode {
    dotenv().ok();
    let log_settings = logging::LogSettings::from_env();
    let _log_guard = logging::init_tracing_subscriber("cm-batch", &log_settings);
    logging::install_tracing_panic_hook("cm-batch", &log_settings);

    let cli = Cli::parse();
    match run(&cli, MatcherConfig::from_env()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "match run failed");
            eprintln!("cm-batch failed: {err}");
            ExitCode::FAILURE
        }
    }
}
