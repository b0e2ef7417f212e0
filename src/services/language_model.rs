use async_trait::async_trait;

use crate::error::AppResult;

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Sends one prompt under the given system instruction and returns the
    /// model's text reply, possibly empty.
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String>;
}
