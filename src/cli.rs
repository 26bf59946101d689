use clap::{Args, Parser, Subcommand};
use clap_complete::aot::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "svcrig",
    version,
    about = "Run isolated instances of containerized service templates"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Use a specific config file
    #[arg(short = 'f', long = "file", global = true, env = "SVCRIG_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch a new instance of a template
    Launch {
        /// Template name (see `svcrig templates`)
        template: String,
        /// Instance label; defaults to the next `instance_<n>`
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Stop a service, keeping its container and port
    Stop {
        /// Service id, e.g. `buckets_instance_1`
        id: String,
    },
    /// Start a stopped service again (stopping it first if running)
    Restart {
        /// Service id
        id: String,
    },
    /// Stop and remove a service and forget it
    #[command(name = "rm")]
    Remove {
        /// Service id
        id: String,
        /// Kill the container instead of waiting for it to stop
        #[arg(long)]
        force: bool,
    },
    /// List registered services
    #[command(name = "ls")]
    List {
        /// Only show instances of this template
        #[arg(short, long)]
        template: Option<String>,
    },
    /// Show one service with its live container state
    Info {
        /// Service id
        id: String,
    },
    /// Print the recent output of a service's container
    Logs {
        /// Service id
        id: String,
        /// Number of lines from the end of the output
        #[arg(short = 'n', long, default_value_t = 50)]
        tail: usize,
    },
    /// Show service counts and used ports
    Stats,
    /// Show every service with its live container state
    Status,
    /// Reconcile the registry with the container runtime
    Cleanup {
        /// Stop and remove every service and labelled container
        #[arg(long, conflicts_with = "status")]
        all: bool,
        /// Only show what `--all` would remove
        #[arg(long)]
        status: bool,
    },
    /// Tear down every service this registry owns
    Shutdown,
    /// Restart stopped services and drop records of vanished containers
    Recover,
    /// List available templates
    Templates,
    /// Launch templates and tear them down on Ctrl+C, SIGTERM, or when all have exited
    Up {
        /// Templates to launch
        #[arg(required = true)]
        templates: Vec<String>,
        /// Instance label applied to every launched template
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Check that the configuration and Docker are usable
    Doctor,
    /// Validate the configuration file
    Validate,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
