//! LLM adapter — translates the internal request to an OpenAI-compatible
//! chat-completions wire payload and parses tool calls back out.

pub mod openai;
pub mod schema;
pub mod traits;

pub use openai::OpenAiCompatClient;
pub use traits::{build_request, LlmClient, LlmResponse, Usage};

/// Environment variable carrying the API key. Unset → [`delta_domain::Error::ApiKey`].
pub const API_KEY_ENV: &str = "DELTA_API_KEY";
/// Optional endpoint override.
pub const BASE_URL_ENV: &str = "DELTA_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
