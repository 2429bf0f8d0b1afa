use crate::aha::AhaClient;
use crate::github::GitHubClient;
use crate::utils::error::{HubError, Result};
use crate::utils::validation::{
    validate_host, validate_non_empty_string, validate_required_field, validate_url, Validate,
};
use crate::zenhub::ZenHubClient;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ZENHUB_URL: &str = "https://api.zenhub.com";

/// Credentials file, one optional section per service.
///
/// ```toml
/// [aha]
/// url = "https://acme.aha.io"
/// token = "${AHA_TOKEN}"
///
/// [github]
/// host = "github.acme.com"
/// token = "${GITHUB_TOKEN}"
/// secret = "hook-secret"
///
/// [zenhub]
/// token = "${ZENHUB_TOKEN}"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    pub aha: Option<AhaConfig>,
    pub github: Option<GitHubConfig>,
    pub zenhub: Option<ZenHubConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AhaConfig {
    pub url: String,
    pub token: String,
}

/// Either `host` (Enterprise, `https://<host>/api/v3`) or explicit
/// `api_url`/`graphql_url`. Neither means github.com.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub host: Option<String>,
    pub api_url: Option<String>,
    pub graphql_url: Option<String>,
    pub token: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZenHubConfig {
    #[serde(default = "default_zenhub_url")]
    pub url: String,
    pub token: String,
}

fn default_zenhub_url() -> String {
    DEFAULT_ZENHUB_URL.to_string()
}

impl HubConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HubError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| HubError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| HubError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn aha_client(&self) -> Result<AhaClient> {
        let aha = validate_required_field("aha", &self.aha)?;
        Ok(AhaClient::new(&aha.url, &aha.token))
    }

    pub fn github_client(&self) -> Result<GitHubClient> {
        let github = validate_required_field("github", &self.github)?;

        let client = match (&github.api_url, &github.host) {
            (Some(api_url), host) => {
                let graphql_url = match (&github.graphql_url, host) {
                    (Some(url), _) => url.clone(),
                    (None, Some(host)) => format!("https://api.{}/graphql", host),
                    (None, None) => format!("{}/graphql", api_url.trim_end_matches('/')),
                };
                GitHubClient::with_api_url(api_url, graphql_url, &github.token, &github.secret)
            }
            (None, Some(host)) => GitHubClient::new(host, &github.token, &github.secret),
            (None, None) => GitHubClient::public(&github.token, &github.secret),
        };
        Ok(client)
    }

    pub fn zenhub_client(&self) -> Result<ZenHubClient> {
        let zenhub = validate_required_field("zenhub", &self.zenhub)?;
        Ok(ZenHubClient::new(&zenhub.url, &zenhub.token))
    }
}

impl Validate for HubConfig {
    fn validate(&self) -> Result<()> {
        if let Some(aha) = &self.aha {
            validate_url("aha.url", &aha.url)?;
            validate_non_empty_string("aha.token", &aha.token)?;
        }

        if let Some(github) = &self.github {
            if let Some(host) = &github.host {
                validate_host("github.host", host)?;
            }
            if let Some(api_url) = &github.api_url {
                validate_url("github.api_url", api_url)?;
            }
            if let Some(graphql_url) = &github.graphql_url {
                validate_url("github.graphql_url", graphql_url)?;
            }
            validate_non_empty_string("github.token", &github.token)?;
        }

        if let Some(zenhub) = &self.zenhub {
            validate_url("zenhub.url", &zenhub.url)?;
            validate_non_empty_string("zenhub.token", &zenhub.token)?;
        }

        Ok(())
    }
}
