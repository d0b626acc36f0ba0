use clap::Parser;
use sftp_poller::cli::{exit_code, run, Cli};
use sftp_poller::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment
    dotenvy::dotenv().ok();

    let logs = match logging::init() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("sftp-poller: {e:#}");
            std::process::exit(1);
        }
    };
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli, Some(&logs)).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    std::process::exit(exit_code(&result));
}
