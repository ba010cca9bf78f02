mod cli;
mod demo;
mod infra;
mod routes;
mod server;
mod verify;

use std::process::ExitCode;

use rental_hub::error::AppError;

pub async fn run() -> Result<ExitCode, AppError> {
    cli::run().await
}
