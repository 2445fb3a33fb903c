/// Shared error type used across all delta crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("run '{0}' already exists in this workspace")]
    DuplicateRun(String),

    #[error("API key missing: set the {0} environment variable")]
    ApiKey(String),

    #[error("LLM call failed: {message}")]
    Llm {
        message: String,
        status: Option<u16>,
        kind: Option<String>,
    },

    #[error("context source: {0}")]
    ContextSource(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("journal: {0}")]
    Journal(String),

    #[error("run state: {0}")]
    RunState(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
