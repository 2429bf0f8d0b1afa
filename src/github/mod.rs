pub mod client;
pub mod git_data;
pub mod model;
pub mod webhook;

pub use client::GitHubClient;
pub use git_data::GitData;
pub use model::{Issue, Milestone, Repository};
pub use webhook::verify_signature;
