/// edscript CLI
///
/// Runs scripts and module sets outside the editor. Useful for developing
/// extensions and checking hooks from a terminal.

use edscript_core::cli;

#[tokio::main]
async fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
