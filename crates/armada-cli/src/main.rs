mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{resource::ResourceSubcommand, task::TaskSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "armada",
    about = "Fleet command dispatch — correlate out-of-band completions and queue deferred work",
    version,
    propagate_version = true
)]
struct Cli {
    /// Control root (default: auto-detect from .armada/ or .git/)
    #[arg(long, global = true, env = "ARMADA_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the .armada/ control directory
    Init,

    /// Dispatch a command against a resource and return immediately
    Dispatch {
        /// Resource the command runs against (site or server id)
        resource: String,
        /// Action identifier, e.g. backup-run-manual
        verb: String,
        /// What the command operates on, typically a domain name
        subject: String,
        /// Shell command to run on the remote host
        command: String,
        /// Use the shared time-bucket disambiguator instead of a unique nonce
        #[arg(long)]
        windowed: bool,
        /// JSON argument snapshot stored on the execution record
        #[arg(long)]
        context: Option<String>,
    },

    /// Deliver a completion signal for a dispatched command
    Complete {
        /// Resource the completion concerns
        resource: String,
        /// Wire-form correlation token (verb---subject---disambiguator)
        token: String,
    },

    /// Manage the pending-task queue
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Inspect and clear per-resource execution records
    Resource {
        #[command(subcommand)]
        subcommand: ResourceSubcommand,
    },

    /// Promote every ready task once
    Sweep,

    /// Run the webhook/API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Dispatch {
            resource,
            verb,
            subject,
            command,
            windowed,
            context,
        } => cmd::dispatch::run(
            &root,
            &resource,
            &verb,
            &subject,
            &command,
            windowed,
            context.as_deref(),
            cli.json,
        ),
        Commands::Complete { resource, token } => {
            cmd::complete::run(&root, &resource, &token, cli.json)
        }
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Resource { subcommand } => cmd::resource::run(&root, subcommand, cli.json),
        Commands::Sweep => cmd::sweep::run(&root, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
