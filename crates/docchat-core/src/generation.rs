//! Generation backend trait.
//!
//! Concrete backends (an OpenAI-compatible HTTP client, test doubles) live
//! outside the core. The core only needs "prompt in, text out" with a
//! bounded wait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::prompt::Prompt;

/// Produces answer text for a prompt.
///
/// Implementations must give up after `timeout` and report
/// [`GenerationError::Timeout`] rather than return a partial answer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend identifier, for logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &Prompt, timeout: Duration) -> Result<String, GenerationError>;
}
