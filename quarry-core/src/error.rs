//! Error types for the Quarry research core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering reasoning backends, the evidence source, configuration, and
//! the research run itself.

/// Top-level error type for the Quarry core library.
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from reasoning backend calls.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Non-success HTTP response; carries the remote body verbatim.
    #[error("HTTP {status} from {provider}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Request to {provider} failed: {message}")]
    Request { provider: String, message: String },

    #[error("Could not read {provider} response: {message}")]
    ResponseParse { provider: String, message: String },

    #[error("Missing credential for provider {provider}: {field}")]
    MissingCredential { provider: String, field: String },

    /// The evidence source failed while the backend was researching a step.
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl BackendError {
    /// Whether this error came from the evidence source rather than the model.
    pub fn is_search_failure(&self) -> bool {
        matches!(self, BackendError::Search(_))
    }
}

/// Errors from the evidence source.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("No search credential provided and {env_var} is not set")]
    MissingCredential { env_var: String },

    #[error("Search request failed: {message}")]
    Request { message: String },

    /// Non-success HTTP response; carries the remote body verbatim.
    #[error("Search API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Search response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Provider probe failed: {message}")]
    ProbeFailed { message: String },
}

/// Errors surfaced by the research orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Provider configuration has not been validated")]
    NotValidated,

    #[error("Research query is empty")]
    EmptyQuery,

    #[error("A research run is already in progress ({state})")]
    AlreadyRunning { state: String },

    #[error("Cannot reset while a run is in progress ({state})")]
    ResetWhileRunning { state: String },

    /// An unrecovered failure aborted the run.
    #[error("{message}")]
    Aborted { message: String },
}

/// A type alias for results using the top-level `QuarryError`.
pub type Result<T> = std::result::Result<T, QuarryError>;
