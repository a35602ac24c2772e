//! Binary entrypoint for the demo driver plugin.

use std::io::{self, Write};

use drivehost_demo_plugin::run;

fn main() {
    if let Err(error) = run(io::stdin().lock(), io::stdout().lock()) {
        writeln!(io::stderr().lock(), "{error}").ok();
        std::process::exit(1);
    }
}
