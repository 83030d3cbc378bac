//! Extracts structured transactions from free-text messages using a remote
//! language model.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The instruction template sent ahead of the user's message.
const PARSER_PROMPT: &str = r#"You are a transaction parser. Extract transaction details from natural language text and return valid JSON.

Examples:
- "I bought coffee for $5.50 at Starbucks" -> {"amount": 5.5, "item": "coffee", "category": "food", "store": "Starbucks"}
- "spent $20 on groceries" -> {"amount": 20, "item": "groceries", "category": "food", "store": null}
- "paid $45 for gas" -> {"amount": 45, "item": "gas", "category": "transport", "store": null}
- "bought new shoes $80" -> {"amount": 80, "item": "shoes", "category": "shopping", "store": null}

Categories should be one of: food, transport, shopping, entertainment, utilities, health, other

Parse the following text and return only valid JSON:
"#;

/// The path of the prediction endpoint, relative to the API base URL.
const PREDICTIONS_PATH: &str = "/v1/models/openai/o4-mini/predictions";

/// The completion budget requested from the model.
const MAX_COMPLETION_TOKENS: u32 = 600;

/// Matches a single-level brace-delimited JSON object.
///
/// The pattern stops at the first closing brace, so model output containing a
/// nested object truncates mid-object and fails the JSON parse.
static JSON_OBJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").expect("hard-coded pattern must compile"));

/// A transaction extracted from free text, normalized and ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransaction {
    /// The amount of money spent. Non-zero, but may still be negative; the
    /// recording handler enforces positivity.
    pub amount: f64,
    /// What was bought, trimmed.
    pub item: String,
    /// The spending category, trimmed and lowercased.
    pub category: String,
    /// The merchant name, trimmed; `None` when absent or blank.
    pub store: Option<String>,
}

/// A client for the text-generation API that turns transaction descriptions
/// into structured data.
///
/// Every failure mode of [TransactionParser::parse] collapses to `None`:
/// transport errors, non-success statuses and unusable model output are all
/// logged and swallowed, and the caller replies with a conversational
/// fallback. There are no retries and no request timeout.
#[derive(Clone)]
pub struct TransactionParser {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl std::fmt::Debug for TransactionParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionParser")
            .field("api_token", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TransactionParser {
    /// The base URL of the hosted inference API.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.replicate.com";

    /// Create a new parser that authenticates with `api_token`.
    ///
    /// `base_url` is the scheme-and-host part of the inference API, without a
    /// trailing slash.
    pub fn new(api_token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Parse a natural-language transaction description.
    ///
    /// Returns `None` when the model's reply contains no usable transaction
    /// or when the request fails; the reason is logged but not surfaced.
    pub async fn parse(&self, text: &str) -> Option<ParsedTransaction> {
        let output = match self.predict(text).await {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!("transaction parser request failed: {error}");
                return None;
            }
        };

        extract_transaction(&output)
    }

    async fn predict(&self, text: &str) -> Result<String, PredictError> {
        let request = PredictionRequest {
            input: PredictionInput {
                prompt: format!("{PARSER_PROMPT}\n\n{text}"),
                max_completion_tokens: MAX_COMPLETION_TOKENS,
            },
        };

        let response = self
            .client
            .post(format!("{}{PREDICTIONS_PATH}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "could not read error body".to_owned());
            return Err(PredictError::HttpStatus {
                code: status.as_u16(),
                body,
            });
        }

        let prediction: PredictionResponse = response.json().await?;

        Ok(match prediction.output {
            Some(PredictionOutput::Text(text)) => text,
            Some(PredictionOutput::Chunks(chunks)) => chunks.concat(),
            None => String::new(),
        })
    }
}

/// Why a prediction request failed. Internal: [TransactionParser::parse]
/// reduces every variant to a logged `None`.
#[derive(Debug, thiserror::Error)]
enum PredictError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("HTTP status {code}: {body}")]
    HttpStatus { code: u16, body: String },
}

#[derive(Debug, Serialize)]
struct PredictionRequest {
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    prompt: String,
    max_completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    output: Option<PredictionOutput>,
}

/// The inference API returns `output` either as one string or as a list of
/// chunks to be concatenated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Text(String),
    Chunks(Vec<String>),
}

/// Pull the first brace-delimited JSON object out of the model output and
/// validate it into a [ParsedTransaction].
fn extract_transaction(output: &str) -> Option<ParsedTransaction> {
    let Some(json_match) = JSON_OBJECT_PATTERN.find(output) else {
        tracing::warn!("no JSON object found in model output: {output}");
        return None;
    };

    let parsed: Value = match serde_json::from_str(json_match.as_str()) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!("could not parse JSON from model output: {error}");
            return None;
        }
    };

    let amount = parsed
        .get("amount")
        .and_then(coerce_amount)
        .filter(|&amount| amount != 0.0);
    let item = nonempty_text(parsed.get("item"));
    let category = nonempty_text(parsed.get("category"));

    let (Some(amount), Some(item), Some(category)) = (amount, item, category) else {
        tracing::warn!("missing required fields in parsed transaction: {parsed}");
        return None;
    };

    Some(ParsedTransaction {
        amount,
        item: item.to_owned(),
        category: category.to_lowercase(),
        store: nonempty_text(parsed.get("store")).map(str::to_owned),
    })
}

/// The model sometimes quotes the amount; accept both numbers and numeric
/// strings.
fn coerce_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn nonempty_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}
