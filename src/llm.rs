use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            max_tokens: 200,
            temperature: 0.3,
        }
    }
}

/// Natural-language answer generation against an Ollama-compatible
/// `/api/generate` endpoint. The retrieval core only produces the context;
/// everything past the prompt is the model server's business.
pub struct AnswerGenerator {
    client: reqwest::blocking::Client,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl AnswerGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        AnswerGenerator {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }

    /// Asks the model to answer `question` strictly from `context` chunks.
    pub fn generate(&self, question: &str, context: &[&str]) -> Result<String> {
        if question.trim().is_empty() {
            return Err(anyhow!("question cannot be empty"));
        }

        let prompt = construct_prompt(question, context);
        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "generating answer");

        let request = GenerateRequest {
            model: &self.config.model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.endpoint))
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .context("answer generation request failed (is the model server running?)")?;

        let body: GenerateResponse = response
            .json()
            .context("failed to parse model server response")?;

        Ok(body.response.trim().to_string())
    }
}

fn construct_prompt(question: &str, context: &[&str]) -> String {
    format!(
        "Answer the question using only the information in the context.\n\n\
         Context:\n{}\n\n\
         Question:\n{}\n\n\
         Answer:",
        context.join("\n\n"),
        question
    )
}
