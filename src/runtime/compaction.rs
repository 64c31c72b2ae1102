//! Context compaction

use super::traits::ClassifierClient;
use crate::llm::LlmError;
use crate::prompts;

/// Ask the classifier for a condensed version of `context`
pub async fn compact<C>(context: &str, client: &C) -> Result<String, LlmError>
where
    C: ClassifierClient + ?Sized,
{
    let reply = client.send(&prompts::context_reduction(context)).await?;
    tracing::info!(
        before_len = context.len(),
        after_len = reply.text.len(),
        tokens = reply.tokens,
        "Context compacted"
    );
    Ok(reply.text)
}
