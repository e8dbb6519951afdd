//! themeblit - command-line tool for rendering palette-themed vector templates

use std::process::ExitCode;

use themeblit::cli;

fn main() -> ExitCode {
    cli::run()
}
