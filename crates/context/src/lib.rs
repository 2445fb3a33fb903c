//! Context composition — resolves the agent's context manifest into the
//! ordered message list for one LLM request.
//!
//! Deterministic by construction: sources resolve in declaration order and
//! the journal reconstruction is a pure function of the event sequence, so
//! rebuilding the conversation any number of times yields the same
//! messages byte for byte.

pub mod composer;
pub mod reconstruct;
pub mod vars;

pub use composer::{compose, ComposeEnv};
pub use reconstruct::reconstruct_messages;
