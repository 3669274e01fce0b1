//! LLM-backed implementation of [`ConstraintExtractionService`].

use super::decode::decode_json_block;
use super::prompts::{
    EXTRACT_SYSTEM_PROMPT, GENRE_VALIDATE_SYSTEM_PROMPT, QUERY_GEN_SYSTEM_PROMPT,
    VIBE_VALIDATE_SYSTEM_PROMPT,
};
use super::service::{ConstraintExtractionService, ExtractionError, ValidationPass};
use super::spec::ConstraintSpec;
use crate::catalog::TrackCandidate;
use crate::llm::{CompletionOptions, LlmProvider, Message};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

pub struct LlmConstraintExtractor {
    llm: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl LlmConstraintExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Render a candidate list the way the validation prompts expect it.
    fn render_candidates(candidates: &[TrackCandidate]) -> String {
        let mut out = String::new();
        for c in candidates {
            let hints = if c.genres.is_empty() {
                "no genre hints".to_string()
            } else {
                c.genres.join(", ")
            };
            let _ = writeln!(
                out,
                "{} | {} | {} | {}",
                c.id,
                c.title,
                c.artists.join(", "),
                hints
            );
        }
        out
    }
}

#[async_trait]
impl ConstraintExtractionService for LlmConstraintExtractor {
    async fn extract(&self, prompt: &str) -> Result<ConstraintSpec, ExtractionError> {
        let messages = [
            Message::system(EXTRACT_SYSTEM_PROMPT),
            Message::user(prompt),
        ];
        let response = self.llm.complete(&messages, &self.options).await?;

        decode_json_block::<ConstraintSpec>(&response.content).ok_or_else(|| {
            debug!(raw = %response.content, "Unparsable extraction output");
            ExtractionError::Parse("extraction output was not a valid constraint object".into())
        })
    }

    async fn generate_queries(
        &self,
        prompt: &str,
        spec: &ConstraintSpec,
        count: usize,
    ) -> Result<Vec<String>, ExtractionError> {
        let spec_json = serde_json::to_string(spec).unwrap_or_else(|_| "{}".into());
        let user = format!(
            "Request: {}\nConstraints: {}\nProduce {} search queries.",
            prompt, spec_json, count
        );
        let messages = [Message::system(QUERY_GEN_SYSTEM_PROMPT), Message::user(user)];
        let response = self.llm.complete(&messages, &self.options).await?;

        let mut queries: Vec<String> = decode_json_block(&response.content).ok_or_else(|| {
            ExtractionError::Parse("query generation output was not a string array".into())
        })?;
        queries.retain(|q| !q.trim().is_empty());
        queries.truncate(count);
        Ok(queries)
    }

    async fn validate(
        &self,
        candidates: &[TrackCandidate],
        spec: &ConstraintSpec,
        pass: ValidationPass,
    ) -> Result<HashSet<String>, ExtractionError> {
        let (system, target) = match pass {
            ValidationPass::Genre => (
                GENRE_VALIDATE_SYSTEM_PROMPT,
                spec.primary_genre.clone().unwrap_or_default(),
            ),
            ValidationPass::Vibe => {
                let mut target = spec.use_case.clone().unwrap_or_default();
                if !spec.atmosphere.is_empty() {
                    if !target.is_empty() {
                        target.push_str(", ");
                    }
                    target.push_str(&spec.atmosphere.join(", "));
                }
                (VIBE_VALIDATE_SYSTEM_PROMPT, target)
            }
        };

        let user = format!(
            "Target: {}\nCandidates (id | title | artist | hints):\n{}",
            target,
            Self::render_candidates(candidates)
        );
        let messages = [Message::system(system), Message::user(user)];
        let response = self.llm.complete(&messages, &self.options).await?;

        let keep: Vec<String> = decode_json_block(&response.content).ok_or_else(|| {
            ExtractionError::Parse(format!("{} validation output was not an id array", pass))
        })?;
        Ok(keep.into_iter().collect())
    }
}
