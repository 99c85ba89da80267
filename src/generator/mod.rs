//! Snippet generation boundary: the round protocol consumes generated
//! snippets as a black box and never depends on how they were produced.

pub mod canned;
#[cfg(feature = "http-generator")]
pub mod http;

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::dao::models::{Difficulty, SnippetEntity};

/// Parameters for one generation call.
#[derive(Debug, Clone)]
pub struct SnippetRequest {
    /// Target formatting difficulty.
    pub difficulty: Difficulty,
    /// Candidate languages; empty means "any language the backend knows".
    pub languages: Vec<String>,
    /// Existing code to re-format instead of generating new content.
    /// When set, [`SnippetRequest::fixed_language`] must name its language and
    /// only the formatting may change.
    pub code_to_reformat: Option<String>,
    /// Pins the output language (required alongside `code_to_reformat`).
    pub fixed_language: Option<String>,
}

impl SnippetRequest {
    /// Request a brand-new snippet in one of the candidate languages.
    pub fn new(difficulty: Difficulty, languages: Vec<String>) -> Self {
        Self {
            difficulty,
            languages,
            code_to_reformat: None,
            fixed_language: None,
        }
    }

    /// Request a re-format of existing code, keeping language and logic.
    pub fn reformat(difficulty: Difficulty, code: String, language: String) -> Self {
        Self {
            difficulty,
            languages: Vec::new(),
            code_to_reformat: Some(code),
            fixed_language: Some(language),
        }
    }
}

/// A snippet produced by a generator backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSnippet {
    /// Difficulty the snippet was formatted for.
    pub difficulty: Difficulty,
    /// Language of the snippet.
    pub language: String,
    /// The code itself.
    pub snippet: String,
    /// Expected answer; always equals `language`.
    pub solution: String,
}

impl From<GeneratedSnippet> for SnippetEntity {
    fn from(value: GeneratedSnippet) -> Self {
        Self {
            difficulty: value.difficulty,
            language: value.language,
            snippet: value.snippet,
            solution: value.solution,
        }
    }
}

/// Error raised by generator backends. Generation failures are recoverable:
/// the host controller surfaces them and retries on its next eligible tick.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The backend could not be reached or answered with garbage.
    #[error("generator unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying transport or decoding error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend refused the request as malformed.
    #[error("generator rejected request: {0}")]
    Rejected(String),
    /// No candidate language matched the request.
    #[error("no candidate language matches the request")]
    NoLanguage,
}

impl GeneratorError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        GeneratorError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over snippet generation backends.
pub trait SnippetGenerator: Send + Sync {
    /// Produce one snippet for the given request.
    fn generate(
        &self,
        request: SnippetRequest,
    ) -> BoxFuture<'static, Result<GeneratedSnippet, GeneratorError>>;
}
