use clap::Parser;
use std::process;
use taxi_kpis::KpiError;
use taxi_kpis::cli::{self, Args};

fn main() {
    // Parse command line arguments; missing positionals exit here with usage
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Without a signal handler the run simply cannot be interrupted
        let shutdown_signal = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = cli::run(args) => result,
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(KpiError::Interrupted {
                    reason: "Processing interrupted by user".to_string(),
                })
            }
        }
    });

    match result {
        Ok(_stats) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(error.exit_code());
        }
    }
}
