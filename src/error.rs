use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Status { url: String, status: u16 },
    Timeout,
    Authentication(String),
    Resolution { kind: &'static str, name: String },
    AttributeNotFound(String),
    InvalidValue { attribute: String, value: String },
    InvalidMode(String),
    Protocol(String),
    Io(std::io::Error),
}

impl Error {
    /// Network-level failures. The write loop tolerates these; everything
    /// else is a configuration or shape fault and is surfaced.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Status { .. } | Error::Timeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { url, status } => write!(f, "HTTP {status} from {url}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Authentication(msg) => write!(f, "authentication failed: {msg}"),
            Error::Resolution { kind, name } => write!(f, "{kind} not found: {name:?}"),
            Error::AttributeNotFound(name) => write!(f, "attribute not found: {name}"),
            Error::InvalidValue { attribute, value } => {
                write!(f, "unrecognized value for {attribute}: {value}")
            }
            Error::InvalidMode(mode) => write!(f, "invalid mode: {mode}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
