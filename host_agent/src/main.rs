//! Shim binary that calls into the `vmagent_host_agent` library's `inner_main`.
use std::process::ExitCode;

use clap::Parser as _;
use eyre::Result;
use vmagent_host_agent::cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    vmagent_host_agent::inner_main(Cli::parse()).await
}
