use std::path::PathBuf;
use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export runs.
///
/// Every variant is fatal to the index (or the whole run, depending on the
/// configured failure policy). Nothing is retried.
#[derive(Debug)]
pub enum ExportError {
    /// Invalid or missing destination path, or invalid settings.
    Config(ConfigError),

    /// No usable index list in the subscription metadata.
    Discovery(DiscoveryError),

    /// Introspection response without a document count.
    EmptyIndex(String),

    /// Directory or file I/O failure.
    Filesystem(FilesystemError),

    /// Failure talking to the account or search service.
    Network(NetworkError),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Destination path exists but cannot hold an export.
    InvalidDestination(PathBuf),

    /// Generic configuration error.
    Generic(String),
}

/// Index discovery errors.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The subscription metadata has no index list at all.
    MissingIndexList,

    /// The index list is present but not list-shaped, or empty.
    InvalidIndexList(String),
}

/// Filesystem errors, always carrying the path that failed.
#[derive(Debug)]
pub enum FilesystemError {
    /// Could not create a directory.
    CreateDir { path: PathBuf, source: io::Error },

    /// Could not write a file.
    Write { path: PathBuf, source: io::Error },

    /// Could not move a file into place.
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Could not remove a file.
    Remove { path: PathBuf, source: io::Error },

    /// Refused to clear a directory the process does not own.
    NotOwned(PathBuf),

    /// Archive creation failed.
    Archive { path: PathBuf, source: io::Error },

    /// Unclassified I/O error.
    Io(io::Error),
}

/// Account and search service errors.
#[derive(Debug)]
pub enum NetworkError {
    /// Could not reach the service.
    ConnectionFailed(String),

    /// Request timed out.
    Timeout(String),

    /// Service answered with a non-success status.
    Status { url: String, status: u16 },

    /// Response body could not be decoded.
    InvalidResponse(String),

    /// Invalid service URL.
    InvalidUrl(String),

    /// Any other request failure.
    RequestFailed(String),
}

impl ExportError {
    /// Short kind label used in logs and run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Config(_) => "ConfigurationError",
            ExportError::Discovery(_) => "DiscoveryError",
            ExportError::EmptyIndex(_) => "EmptyIndexError",
            ExportError::Filesystem(_) => "FilesystemError",
            ExportError::Network(_) => "NetworkError",
            ExportError::Generic(_) => "Error",
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Discovery(e) => write!(f, "Discovery error: {e}"),
            ExportError::EmptyIndex(index) => {
                write!(f, "Index {index} did not have any indexed items")
            }
            ExportError::Filesystem(e) => write!(f, "Filesystem error: {e}"),
            ExportError::Network(e) => write!(f, "Network error: {e}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::InvalidDestination(path) => {
                write!(f, "Destination is not a directory: {}", path.display())
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::MissingIndexList => {
                write!(f, "No search indexes found for the given subscription")
            }
            DiscoveryError::InvalidIndexList(msg) => write!(f, "Invalid index list: {msg}"),
        }
    }
}

impl fmt::Display for FilesystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilesystemError::CreateDir { path, source } => {
                write!(f, "Failed to create directory {}: {source}", path.display())
            }
            FilesystemError::Write { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
            FilesystemError::Move { from, to, source } => write!(
                f,
                "Failed to move {} to {}: {source}",
                from.display(),
                to.display()
            ),
            FilesystemError::Remove { path, source } => {
                write!(f, "Failed to remove {}: {source}", path.display())
            }
            FilesystemError::NotOwned(path) => write!(
                f,
                "Refusing to clear {}: not a staging directory owned by this run",
                path.display()
            ),
            FilesystemError::Archive { path, source } => {
                write!(f, "Failed to build archive {}: {source}", path.display())
            }
            FilesystemError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            NetworkError::Timeout(msg) => write!(f, "Request timed out: {msg}"),
            NetworkError::Status { url, status } => write!(f, "HTTP {status} from {url}"),
            NetworkError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
            NetworkError::InvalidUrl(url) => write!(f, "Invalid service URL: {url}"),
            NetworkError::RequestFailed(msg) => write!(f, "Request failed: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Filesystem(e) => Some(e),
            ExportError::Network(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for ConfigError {}
impl std::error::Error for DiscoveryError {}
impl std::error::Error for NetworkError {}

impl std::error::Error for FilesystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilesystemError::CreateDir { source, .. }
            | FilesystemError::Write { source, .. }
            | FilesystemError::Move { source, .. }
            | FilesystemError::Remove { source, .. }
            | FilesystemError::Archive { source, .. } => Some(source),
            FilesystemError::Io(e) => Some(e),
            FilesystemError::NotOwned(_) => None,
        }
    }
}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Filesystem(FilesystemError::Io(err))
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        ExportError::Network(NetworkError::from(err))
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if let Some(status) = err.status() {
            NetworkError::Status {
                url,
                status: status.as_u16(),
            }
        } else if err.is_timeout() {
            NetworkError::Timeout(url)
        } else if err.is_connect() {
            NetworkError::ConnectionFailed(format!("{url}: {err}"))
        } else if err.is_decode() {
            NetworkError::InvalidResponse(format!("{url}: {err}"))
        } else if err.is_builder() {
            NetworkError::InvalidUrl(format!("{url}: {err}"))
        } else {
            NetworkError::RequestFailed(err.to_string())
        }
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<DiscoveryError> for ExportError {
    fn from(err: DiscoveryError) -> Self {
        ExportError::Discovery(err)
    }
}

impl From<FilesystemError> for ExportError {
    fn from(err: FilesystemError) -> Self {
        ExportError::Filesystem(err)
    }
}

impl From<NetworkError> for ExportError {
    fn from(err: NetworkError) -> Self {
        ExportError::Network(err)
    }
}
