use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use topology::{Filter, WILDCARD};

#[derive(Parser)]
#[command(name = "stackadm")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Deploy and operate distributed storage clusters over SSH and Docker", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage clusters
    #[command(subcommand)]
    Cluster(ClusterCommand),

    /// Manage the SSH hosts inventory
    #[command(subcommand)]
    Hosts(HostsCommand),

    /// Show cluster topology and settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Deploy the checked out cluster
    Deploy(DeployArgs),

    /// Start services
    Start(ServiceArgs),

    /// Stop services
    Stop(ConfirmArgs),

    /// Restart services
    Restart(ConfirmArgs),

    /// Sync configuration and restart services
    Reload(ServiceArgs),

    /// Show service status
    Status(StatusArgs),

    /// Remove service logs, data and containers
    Clean(CleanArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Cluster Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ClusterCommand {
    /// Register a cluster from a topology file
    Add {
        /// Cluster name
        name: String,

        /// Topology file
        #[arg(short = 'f', long = "topology")]
        topology: PathBuf,

        /// Free-form description
        #[arg(short = 'm', long)]
        description: Option<String>,

        /// Check the cluster out after adding it
        #[arg(short, long)]
        checkout: bool,
    },

    /// Switch the current cluster
    Checkout {
        /// Cluster name
        name: String,
    },

    /// List clusters
    #[command(alias = "ls")]
    List {
        /// Show uuid and description
        #[arg(short, long)]
        long: bool,
    },

    /// Remove a cluster from the registry
    #[command(alias = "rm")]
    Remove {
        /// Cluster name
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

// ============================================================================
// Hosts and Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum HostsCommand {
    /// Validate and store a hosts inventory
    Commit {
        /// Inventory file
        file: PathBuf,
    },

    /// Show the committed inventory
    Show {
        /// Print the committed file as is
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the topology of the current cluster
    Show,

    /// Replace the topology of the current cluster
    Commit {
        /// Topology file
        file: PathBuf,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Write stackadm.toml with default settings
    Init,

    /// Print the effective settings
    Settings,
}

// ============================================================================
// Playbook Commands
// ============================================================================

/// Which services a command acts on
#[derive(Args, Clone)]
pub struct FilterArgs {
    /// Service id or instance id
    #[arg(long, default_value = WILDCARD)]
    pub id: String,

    /// Service role
    #[arg(long, default_value = WILDCARD)]
    pub role: String,

    /// Service host
    #[arg(long, default_value = WILDCARD)]
    pub host: String,
}

impl From<&FilterArgs> for Filter {
    fn from(args: &FilterArgs) -> Self {
        Self::new(args.id.as_str(), args.role.as_str(), args.host.as_str())
    }
}

#[derive(Args)]
pub struct JobsArgs {
    /// Tasks to run at once in each phase
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
}

impl JobsArgs {
    pub fn get(&self) -> Option<usize> {
        self.jobs.map(usize::from)
    }
}

#[derive(Args)]
pub struct DeployArgs {
    /// Service roles to leave out (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Use images already present on the hosts
    #[arg(long)]
    pub local: bool,

    #[command(flatten)]
    pub jobs: JobsArgs,
}

#[derive(Args)]
pub struct ServiceArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub jobs: JobsArgs,
}

#[derive(Args)]
pub struct ConfirmArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub jobs: JobsArgs,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub jobs: JobsArgs,

    /// One line per service instead of per deploy entry
    #[arg(long)]
    pub expand: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub jobs: JobsArgs,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Only remove these items: log, data, container (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}
