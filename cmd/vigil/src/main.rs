//! Vigil CLI - alert rule validation and saving.
//!
//! Commands:
//! - `vigil validate` - Check a rule file locally
//! - `vigil save` - Save a rule and wait for verification
//! - `vigil delete` - Delete a rule
//! - `vigil members` - List organization members

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use vigil_api::{ClientConfig, DEFAULT_BASE_URL};
use vigil_rule::RuleKind;

mod commands;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Validate and save alert rules")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Backend connection flags shared by networked commands.
#[derive(Args)]
struct Connection {
    /// API root URL
    #[arg(long, env = "VIGIL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Auth token
    #[arg(long, env = "VIGIL_AUTH_TOKEN", hide_env_values = true)]
    token: String,

    /// Organization slug
    #[arg(long, env = "VIGIL_ORG")]
    org: String,

    /// Project slug
    #[arg(long, env = "VIGIL_PROJECT")]
    project: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

impl Connection {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url,
            auth_token: self.token,
            organization: self.org,
            project: self.project,
            timeout_seconds: self.timeout,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Issue,
    Metric,
}

impl From<Kind> for RuleKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Issue => Self::Issue,
            Kind::Metric => Self::Metric,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rule file without contacting the backend
    Validate {
        /// Path to rule file (.json, .yaml or .yml)
        rule: String,

        /// Rule kind
        #[arg(short, long, value_enum, default_value = "metric")]
        kind: Kind,
    },

    /// Save a rule, waiting for asynchronous verification
    Save {
        /// Path to rule file (.json, .yaml or .yml)
        rule: String,

        /// Rule kind
        #[arg(short, long, value_enum, default_value = "metric")]
        kind: Kind,

        /// Save as a new copy of the rule
        #[arg(long)]
        duplicate: bool,

        /// Origin reported to the backend
        #[arg(long)]
        referrer: Option<String>,

        /// Skip checking email targets against the member list
        #[arg(long)]
        skip_members: bool,

        /// Write the saved rule to this path
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        connection: Connection,
    },

    /// Delete a rule
    Delete {
        /// Rule identifier
        id: String,

        /// Rule kind
        #[arg(short, long, value_enum, default_value = "metric")]
        kind: Kind,

        #[command(flatten)]
        connection: Connection,
    },

    /// List organization members
    Members {
        #[command(flatten)]
        connection: Connection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Validate { rule, kind } => commands::validate::run(&rule, kind.into()),
        Commands::Save {
            rule,
            kind,
            duplicate,
            referrer,
            skip_members,
            output,
            connection,
        } => {
            commands::save::run(
                &rule,
                kind.into(),
                commands::save::Flags {
                    duplicate,
                    referrer,
                    check_members: !skip_members,
                    output,
                },
                connection.into_config(),
            )
            .await
        }
        Commands::Delete {
            id,
            kind,
            connection,
        } => commands::delete::run(&id, kind.into(), connection.into_config()).await,
        Commands::Members { connection } => commands::members::run(connection.into_config()).await,
    }
}
