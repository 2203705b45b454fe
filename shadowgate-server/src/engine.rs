//! Answers for the AI deck query operation.
//!
//! [`QueryEngine`] is the seam where a real model backend plugs in.
//! [`CannedEngine`] answers deterministically and is what the server runs
//! with out of the box.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shadowgate::BoxFuture;

/// Model a query is addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiModel {
    /// Anthropic Claude.
    #[default]
    Claude,
    /// OpenAI GPT-4.
    Gpt4,
    /// Google Gemini.
    Gemini,
}

impl AiModel {
    /// All models, in the order they are advertised.
    pub const ALL: [Self; 3] = [Self::Claude, Self::Gpt4, Self::Gemini];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gpt4 => "gpt4",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model name is not one of [`AiModel::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model `{0}`")]
pub struct UnknownModel(pub String);

impl FromStr for AiModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownModel(s.to_owned()))
    }
}

/// A model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Reply text.
    pub text: String,
    /// Tokens billed for the reply.
    pub tokens_used: u32,
}

/// The engine could not answer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The backend is unreachable or refused the query.
    #[error("AI deck offline: {0}")]
    Unavailable(String),
}

/// Answers natural-language queries.
pub trait QueryEngine: Send + Sync {
    /// Answers `query` with `model`, spending at most `max_tokens`.
    fn answer<'a>(
        &'a self,
        query: &'a str,
        model: AiModel,
        max_tokens: u32,
    ) -> BoxFuture<'a, Result<Answer, EngineError>>;
}

/// Fixed per-model replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedEngine;

impl CannedEngine {
    const TOKENS_PER_ANSWER: u32 = 500;
    const ECHO_CHARS: usize = 50;
}

impl QueryEngine for CannedEngine {
    fn answer<'a>(
        &'a self,
        query: &'a str,
        model: AiModel,
        max_tokens: u32,
    ) -> BoxFuture<'a, Result<Answer, EngineError>> {
        let text = match model {
            AiModel::Claude => {
                let echo: String = query.chars().take(Self::ECHO_CHARS).collect();
                format!("[CLAUDE DECK]: Processing query in the sprawl... Analysis: {echo}...")
            }
            AiModel::Gpt4 => "[GPT-4 DECK]: Neural pathways engaged. Query processed.".to_owned(),
            AiModel::Gemini => "[GEMINI DECK]: Quantum analysis complete.".to_owned(),
        };
        let answer = Answer {
            text,
            tokens_used: Self::TOKENS_PER_ANSWER.min(max_tokens),
        };
        Box::pin(async move { Ok(answer) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claude_echoes_query_prefix() {
        let query = "x".repeat(80);
        let answer = CannedEngine.answer(&query, AiModel::Claude, 1000).await.unwrap();
        assert!(answer.text.starts_with("[CLAUDE DECK]"));
        assert!(answer.text.contains(&"x".repeat(50)));
        assert!(!answer.text.contains(&"x".repeat(51)));
        assert_eq!(answer.tokens_used, 500);
    }

    #[tokio::test]
    async fn test_tokens_capped_by_budget() {
        let answer = CannedEngine.answer("ping", AiModel::Gemini, 64).await.unwrap();
        assert_eq!(answer.text, "[GEMINI DECK]: Quantum analysis complete.");
        assert_eq!(answer.tokens_used, 64);
    }

    #[test]
    fn test_model_names() {
        assert_eq!("GPT4".parse::<AiModel>().unwrap(), AiModel::Gpt4);
        assert_eq!(AiModel::Gemini.to_string(), "gemini");
        assert!("llama".parse::<AiModel>().is_err());
    }
}
