//! HTTP generator backend delegating to an external generation service.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{
    dao::models::Difficulty,
    generator::{GeneratedSnippet, GeneratorError, SnippetGenerator, SnippetRequest},
};

/// Generator backend that delegates to an external HTTP generation service.
///
/// The wire format matches the generation flow of the original frontend:
/// a single POST carrying difficulty, candidate languages, and the optional
/// re-format payload, answered with `{difficulty, language, snippet,
/// solution}`.
pub struct HttpSnippetGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSnippetGenerator {
    /// Build a generator posting to the given endpoint.
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    difficulty: Difficulty,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_to_transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    difficulty: Difficulty,
    language: String,
    snippet: String,
    solution: String,
}

impl SnippetGenerator for HttpSnippetGenerator {
    fn generate(
        &self,
        request: SnippetRequest,
    ) -> BoxFuture<'static, Result<GeneratedSnippet, GeneratorError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            if request.code_to_reformat.is_some() && request.fixed_language.is_none() {
                return Err(GeneratorError::Rejected(
                    "re-formatting requires a pinned language".into(),
                ));
            }

            let wire = WireRequest {
                difficulty: request.difficulty,
                languages: request.languages,
                code_to_transform: request.code_to_reformat,
                language: request.fixed_language.clone(),
            };

            let response = client
                .post(&endpoint)
                .json(&wire)
                .send()
                .await
                .map_err(|err| {
                    GeneratorError::unavailable(format!("POST {endpoint} failed"), err)
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(GeneratorError::Rejected(format!(
                    "generation service answered {status}"
                )));
            }

            let mut payload: WireResponse = response.json().await.map_err(|err| {
                GeneratorError::unavailable("malformed generation response".into(), err)
            })?;

            // The service occasionally drifts from the requested language;
            // pin the fields the same way the original flow overrides them.
            if let Some(language) = request.fixed_language {
                payload.language = language;
            }
            payload.solution = payload.language.clone();
            payload.difficulty = request.difficulty;

            Ok(GeneratedSnippet {
                difficulty: payload.difficulty,
                language: payload.language,
                snippet: payload.snippet,
                solution: payload.solution,
            })
        })
    }
}
