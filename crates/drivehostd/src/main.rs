//! Entry point for the drivehost daemon.

use std::io::{self, Write};
use std::process::ExitCode;

use drivehostd::{SystemConfigLoader, SystemShutdownSignal, run};

fn main() -> ExitCode {
    match run(&SystemConfigLoader, &SystemShutdownSignal) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr(), "drivehostd: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
