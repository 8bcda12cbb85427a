//! JSON-RPC helpers for probing the L2 node.

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Method returning the address of the main contract once the L2 bootstrap has deployed it.
pub const GET_MAIN_CONTRACT_METHOD: &str = "zks_getMainContract";

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Build a JSON-RPC 2.0 request body. The id is always 1.
pub fn json_rpc_request(method: &str, params: Vec<Value>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

/// Classification of a single readiness probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The node reported a deployed main contract.
    Ready(Value),
    /// Anything else, with a reason for diagnostics.
    NotReady(String),
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready(_))
    }
}

/// Ask the node at `url` for its main contract and classify the answer.
///
/// Transport errors, non-success HTTP statuses, undecodable bodies and falsy
/// results all classify as [`ProbeOutcome::NotReady`]; this never fails.
pub async fn probe_main_contract(client: &reqwest::Client, url: &str) -> ProbeOutcome {
    let response = match client
        .post(url)
        .json(&json_rpc_request(GET_MAIN_CONTRACT_METHOD, vec![]))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return ProbeOutcome::NotReady(format!("request failed: {}", e)),
    };

    let status = response.status();
    if !status.is_success() {
        return ProbeOutcome::NotReady(format!("HTTP status {}", status));
    }

    match response.json::<Value>().await {
        Ok(body) => classify_response(&body),
        Err(e) => ProbeOutcome::NotReady(format!("invalid response body: {}", e)),
    }
}

/// Classify a decoded JSON-RPC response body.
///
/// Readiness is decided by `result` alone. A non-null `error` only supplies the
/// reason when the result is missing or falsy.
pub fn classify_response(body: &Value) -> ProbeOutcome {
    let result = body.get("result");
    if let Some(result) = result.filter(|result| is_truthy(result)) {
        return ProbeOutcome::Ready(result.clone());
    }

    if let Some(error) = body.get("error").filter(|error| !error.is_null()) {
        return ProbeOutcome::NotReady(format!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        ));
    }

    match result {
        Some(_) => ProbeOutcome::NotReady("main contract not deployed yet".to_string()),
        None => ProbeOutcome::NotReady("no result in response".to_string()),
    }
}

/// `null`, `false`, zero and the empty string are falsy; everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
