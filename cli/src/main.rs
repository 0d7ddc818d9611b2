mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Deliver e-invoices to the ER>B webservice of the Austrian federal government.
#[derive(Debug, Parser)]
#[command(name = "erb-send", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deliver invoice files, or every *.xml below a directory
    Send(SendArgs),
    /// Show or change the stored settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage the webservice password in the OS keychain
    #[command(subcommand)]
    Password(PasswordCommand),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Webservice version (1.2 or 2.0); defaults to the stored setting
    #[arg(long)]
    pub protocol: Option<String>,
    /// Deliver to the test installation instead of production
    #[arg(long)]
    pub test_endpoint: bool,
    /// Only validate, do not submit
    #[arg(long)]
    pub test_only: bool,
    /// File to attach to every invoice
    #[arg(long = "attach", value_name = "FILE")]
    pub attachments: Vec<PathBuf>,
    /// MIME type of the attachments; guessed from the extension otherwise
    #[arg(long, value_name = "TYPE")]
    pub mime: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show,
    /// e.g. `config set endpoint test` or `config set namespaces.eb <uri>`
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
enum PasswordCommand {
    /// Read the password from stdin and store it
    Set {
        #[arg(long)]
        username: Option<String>,
    },
    Delete {
        #[arg(long)]
        username: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Send(args) => commands::send(args).await,
        Command::Config(ConfigCommand::Show) => commands::show_config().map(|_| true),
        Command::Config(ConfigCommand::Set { key, value }) => {
            commands::set_config(&key, &value).map(|_| true)
        }
        Command::Password(PasswordCommand::Set { username }) => {
            commands::set_password(username).map(|_| true)
        }
        Command::Password(PasswordCommand::Delete { username }) => {
            commands::delete_password(username).map(|_| true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
