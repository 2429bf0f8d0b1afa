pub mod aha;
pub mod config;
pub mod core;
pub mod github;
pub mod utils;
pub mod zenhub;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use aha::AhaClient;
pub use config::HubConfig;
pub use github::GitHubClient;
pub use utils::error::{HubError, Result};
pub use zenhub::ZenHubClient;
