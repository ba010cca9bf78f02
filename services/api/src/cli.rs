use std::path::PathBuf;
use std::process::ExitCode;

use crate::demo::{run_demo, DemoArgs};
use crate::server;
use crate::verify::run_verify_env;
use clap::{Args, Parser, Subcommand};
use rental_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "rental-hub-api",
    about = "Run the rental marketplace API and its operator tooling",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Check that the deployment environment is complete
    VerifyEnv(VerifyEnvArgs),
    /// Walk through a listing, a booking request and the owner's answer in memory
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct VerifyEnvArgs {
    /// Path of the dotenv file to load and check
    #[arg(long, default_value = ".env")]
    pub(crate) env_file: PathBuf,
}

pub(crate) async fn run() -> Result<ExitCode, AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await.map(|()| ExitCode::SUCCESS),
        Command::VerifyEnv(args) => Ok(run_verify_env(args)),
        Command::Demo(args) => run_demo(args).await.map(|()| ExitCode::SUCCESS),
    }
}
