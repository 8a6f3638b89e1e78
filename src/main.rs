//! Runbox - compile-and-run service for Rust snippets.
//!
//! Usage:
//!   runbox serve [--port 5000]      # Start HTTP server
//!   runbox run <FILE|->             # Execute one source file and print the result

use clap::{Parser, Subcommand};
use runbox::{http_server, AppState, Executor, SandboxArgs, SandboxConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::exit;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "runbox")]
#[command(about = "Compile and run Rust snippets in throwaway Docker containers")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, env = "RUNBOX_PORT", default_value = "5000")]
        port: u16,

        #[command(flatten)]
        sandbox: SandboxArgs,
    },
    /// Compile and run a single source file ("-" reads stdin)
    Run {
        file: PathBuf,

        #[command(flatten)]
        sandbox: SandboxArgs,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let sandbox = match &args.command {
        Commands::Serve { sandbox, .. } | Commands::Run { sandbox, .. } => sandbox.clone(),
    };

    let config = match SandboxConfig::try_from(sandbox) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let executor = match Executor::docker(config) {
        Ok(executor) => executor,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    match args.command {
        Commands::Serve { port, .. } => {
            if let Err(e) = http_server::run_server(port, AppState::new(executor)).await {
                eprintln!("Error: {}", e);
                exit(1);
            }
        }
        Commands::Run { file, .. } => {
            let source = match read_source(&file) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("Error: cannot read {}: {}", file.display(), e);
                    exit(1);
                }
            };
            let result = executor.execute(&source).await;
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    exit(1);
                }
            }
            exit(if result.is_success() { 0 } else { 1 });
        }
    }
}

fn read_source(file: &Path) -> std::io::Result<String> {
    if file.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        std::fs::read_to_string(file)
    }
}
