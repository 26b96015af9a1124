//! snowdrift CLI: forwards JSON lines from stdin and routes undecodable ones
//! through the failure-handling service.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use snowdrift::{CliArgs, init_tracing};

fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(snowdrift::app::run(args));
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("snowdrift failed: {e}");
            ExitCode::FAILURE
        }
    }
}
