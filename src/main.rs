mod chat;
mod cli;
mod config;
mod error;
mod knowledge;
mod llm;
mod logging;
mod ocr;
mod prompt;
mod server;
mod store;
mod triage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doctor-ai")]
#[command(about = "Cardiology education chatbot backed by a local LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory holding data files (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Config file to use instead of .doctor-ai/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check LLM server, OCR engine and data files
    Doctor,

    /// Ask a single question and stream the answer
    Ask {
        /// Session to keep history under
        #[arg(long)]
        session: Option<String>,

        /// The question
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },

    /// Extract text from an image
    Ocr {
        /// Image file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.debug, cli.quiet, cli.log_file.clone())?;

    let base_dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let mut config = config::DoctorConfig::load(Some(&base_dir), cli.config.as_deref())?;

    let exit_code = match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cli::commands::serve(config, &base_dir).await?
        }

        Commands::Doctor => cli::commands::doctor(&config, &base_dir).await?,

        Commands::Ask { session, message } => {
            let message = message.join(" ");
            cli::commands::ask(&config, &base_dir, &message, session).await?
        }

        Commands::Ocr { file } => cli::commands::ocr(&config, &file).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
