//! Error types for ormload operations.

use std::fmt;

/// The primary error type for ormload collaborators and configuration.
///
/// The loading coordinator itself never returns this type: cache failures
/// surface here from cache implementations and are logged by the caller.
#[derive(Debug)]
pub enum Error {
    /// Second-level cache errors (region unavailable, put rejected)
    Cache(CacheError),
    /// Configuration errors
    Config(ConfigError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct CacheError {
    pub kind: CacheErrorKind,
    pub region: String,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheErrorKind {
    /// The region cannot be reached
    Unavailable,
    /// The region did not answer in time
    Timeout,
    /// The region refused the entry
    Rejected,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CacheError {
    /// Create a cache error for a region.
    pub fn new(kind: CacheErrorKind, region: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            region: region.into(),
            message: message.into(),
            source: None,
        }
    }
}

impl Error {
    /// Is this a transient cache failure that a later put may not hit?
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Cache(c) => matches!(
                c.kind,
                CacheErrorKind::Unavailable | CacheErrorKind::Timeout
            ),
            _ => false,
        }
    }

    /// Get the cache region involved, if any.
    pub fn region(&self) -> Option<&str> {
        match self {
            Error::Cache(c) => Some(&c.region),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Cache(e) => write!(f, "Cache error in region '{}': {}", e.region, e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Cache(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<CacheError> for Error {
    fn from(err: CacheError) -> Self {
        Error::Cache(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for ormload operations.
pub type Result<T> = std::result::Result<T, Error>;
