//! Typed errors for the crate's boundary surfaces. Internal plumbing
//! uses `anyhow`; these variants are the failures callers branch on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynapseError {
    #[error("malformed topic: {0}")]
    MalformedTopic(String),

    #[error("invalid execution context: {0} is missing or empty")]
    InvalidContext(&'static str),

    #[error("no strategy can handle step type '{0}'")]
    NoStrategy(String),

    #[error("unknown strategy '{0}' requested")]
    UnknownStrategy(String),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("resource registry is not initialized")]
    NotInitialized,
}
