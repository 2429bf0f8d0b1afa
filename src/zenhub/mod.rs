pub mod client;
pub mod model;

pub use client::ZenHubClient;
pub use model::{Board, Issue, Pipeline, Workspace};
