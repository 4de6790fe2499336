use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Rate limited and retries exhausted.
    Throttled(String),
    Auth(String),
    Forbidden(String),
    NotFound(String),
    Validation(String),
    /// Any other non-2xx remote status.
    Remote { status: u16, message: String },
    Http(String),
    Parse(String),
    Io(std::io::Error),
    Config(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Throttled(e) => write!(f, "Rate limit exceeded: {}", e),
            Error::Auth(e) => write!(f, "Authentication failed: {}", e),
            Error::Forbidden(e) => write!(f, "Action forbidden: {}", e),
            Error::NotFound(e) => write!(f, "Resource not found: {}", e),
            Error::Validation(e) => write!(f, "Validation failed: {}", e),
            Error::Remote { status, message } => write!(f, "API error ({}): {}", status, message),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Error {
        Error::Parse(err.to_string())
    }
}
