// MIT License
// Copyright (c) 2024 Graham King

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::embed::Embedder;

pub const EMBED_MODEL: &str = "text-embedding-3-small";

const EMBED_URL: &str = "https://api.openai.com/v1/embeddings";
const MAX_ATTEMPTS: usize = 4;
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, serde::Deserialize)]
struct EmbedResponse {
    data: Vec<Embedding>,
}

#[derive(Debug, serde::Deserialize)]
struct Embedding {
    index: usize,
    embedding: Vec<f64>,
}

pub struct OpenAi {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl OpenAi {
    pub fn new(api_key: String, model: &str) -> OpenAi {
        OpenAi {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: model.to_string(),
        }
    }
}

impl Embedder for OpenAi {
    fn model(&self) -> &str {
        &self.model
    }

    /// One request for the whole batch. A 429 is retried after a fixed wait,
    /// anything else that isn't a 200 is an error.
    fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f64>>> {
        let req = EmbedRequest {
            model: &self.model,
            input: inputs,
        };
        let mut attempt = 1;
        let res = loop {
            let res = self
                .client
                .post(EMBED_URL)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()?;
            if res.status() == http::StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                warn!(
                    "Rate limited, waiting {}s (attempt {attempt} of {MAX_ATTEMPTS})",
                    RATE_LIMIT_WAIT.as_secs()
                );
                thread::sleep(RATE_LIMIT_WAIT);
                attempt += 1;
                continue;
            }
            break res;
        };
        if res.status() != http::StatusCode::OK {
            return Err(anyhow::anyhow!(
                "HTTP error {} {:?}",
                res.status(),
                res.text()
            ));
        }
        let mut out: EmbedResponse = res.json()?;
        if out.data.len() != inputs.len() {
            return Err(anyhow::anyhow!(
                "Asked for {} embeddings, got {}",
                inputs.len(),
                out.data.len()
            ));
        }
        out.data.sort_by_key(|e| e.index);
        Ok(out.data.into_iter().map(|e| e.embedding).collect())

        /* Example response
        {
          "object": "list",
          "data": [
            {
              "object": "embedding",
              "index": 0,
              "embedding": [
                -0.006929283495992422,
                ... (omitted for spacing)
                -0.024047505110502243
              ],
            }
          ],
          "model": "text-embedding-3-small",
          "usage": {
            "prompt_tokens": 5,
            "total_tokens": 5
          }
        }
        */
    }
}
