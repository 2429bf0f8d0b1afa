use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{service}: error {url}: {status} {body}")]
    ApiError {
        service: &'static str,
        status: u16,
        url: String,
        body: String,
    },

    #[error("Missing {service} token")]
    MissingToken { service: &'static str },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Can't find {what} {name:?}")]
    NotFound { what: &'static str, name: String },

    #[error("Can't find {field}/{value:?} as a valid option")]
    InvalidOption { field: String, value: String },

    #[error("Unsupported custom field {name:?}: {kind}")]
    UnsupportedField { name: String, kind: String },

    #[error("Unexpected value for {field}: {message}")]
    UnexpectedValue { field: String, message: String },

    #[error("GraphQL error: {message}")]
    GraphQlError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value {value:?} for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl HubError {
    /// HTTP status of a vendor error response, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            HubError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::NotFound { .. }) || self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
