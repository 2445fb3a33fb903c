//! Tool executor — turns a tool definition plus LLM-supplied arguments
//! into a child-process invocation, and the raw result into the
//! observation string fed back to the model.

pub mod executor;
pub mod observation;

pub use executor::{build_invocation, execute, ExecutionResult, Invocation};
pub use observation::format_observation;
