mod commands;
mod context;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshform", version)]
#[command(about = "Reconcile cloud network resources declared in KDL", long_about = None)]
struct Cli {
    /// Resource file (default: discovered from the current directory)
    #[arg(short, long, global = true, env = "MESHFORM_CONFIG_PATH")]
    file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every resource against cloud capabilities and field rules
    Validate {
        /// Resource file to check (overrides --file)
        path: Option<PathBuf>,
    },
    /// Show the operations apply would run
    Plan {
        /// Only this resource, as family/name
        #[arg(short, long)]
        target: Option<String>,
        /// Diff against the stored snapshots instead of reading the controller
        #[arg(long)]
        offline: bool,
    },
    /// Reconcile the controller with the resource file
    Apply {
        /// Only this resource, as family/name
        #[arg(short, long)]
        target: Option<String>,
        /// Run without stopping after the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-read resources from the controller into the snapshot store
    Refresh {
        /// Only this resource, as family/name
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Delete a resource and its HA secondary
    Destroy {
        /// Resource family (see `meshform families`)
        family: String,
        /// Resource name
        name: String,
        /// Run without stopping after the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// List the supported resource families
    Families,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Families => commands::families::handle(),
        Commands::Validate { path } => {
            let file = path.or(cli.file);
            commands::validate::handle(file.as_deref())
        }
        Commands::Plan { target, offline } => {
            let project = context::Project::load(cli.file.as_deref())?;
            commands::plan::handle(&project, target.as_deref(), offline).await
        }
        Commands::Apply { target, yes } => {
            let project = context::Project::load(cli.file.as_deref())?;
            commands::apply::handle(&project, target.as_deref(), yes).await
        }
        Commands::Refresh { target } => {
            let project = context::Project::load(cli.file.as_deref())?;
            commands::refresh::handle(&project, target.as_deref()).await
        }
        Commands::Destroy { family, name, yes } => {
            let project = context::Project::load(cli.file.as_deref())?;
            commands::destroy::handle(&project, &family, &name, yes).await
        }
    }
}
