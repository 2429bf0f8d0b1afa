pub mod toml_config;

pub use toml_config::HubConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "hubsync")]
#[command(about = "Work with Aha!, GitHub and ZenHub from the command line")]
pub struct CliConfig {
    #[arg(long, short, default_value = "hubsync.toml")]
    pub config: PathBuf,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Get, set, compare or remove a custom field value on an Aha! feature
    AhaField {
        /// Feature id or reference number, e.g. APP-123
        feature: String,
        /// Custom field name or key
        name: String,
        /// get | set | compare | remove
        action: String,
        value: Option<String>,
    },

    /// Show or edit the `**_Label_**: value` data block of a GitHub issue
    IssueData {
        owner: String,
        repo: String,
        number: u64,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, requires = "label", conflicts_with = "delete")]
        set: Option<String>,
        /// Remove the label, or only `--value` when given
        #[arg(long, requires = "label")]
        delete: bool,
        #[arg(long, requires = "delete")]
        value: Option<String>,
    },

    /// Check a webhook payload against an X-Hub-Signature value
    VerifyWebhook {
        #[arg(long)]
        signature: String,
        #[arg(long)]
        payload: PathBuf,
        /// Overrides `github.secret` from the config file
        #[arg(long)]
        secret: Option<String>,
    },

    /// Move an issue to a ZenHub pipeline by name
    MoveIssue {
        repo_id: u64,
        workspace: String,
        issue: u64,
        pipeline: String,
    },
}
