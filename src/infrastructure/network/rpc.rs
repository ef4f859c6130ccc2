// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::retry_async;
use crate::domain::error::AppError;
use crate::services::reconcile::ports::{NetworkSubmitter, SignatureStatus, Simulation};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

const READ_ATTEMPTS: usize = 3;
const READ_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulation {
    err: Option<Value>,
    logs: Option<Vec<String>>,
    units_consumed: Option<u64>,
}

fn decode_response<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, AppError> {
    let response: RpcResponse<T> = serde_json::from_value(body)
        .map_err(|e| AppError::Connection(format!("{method}: malformed response ({e})")))?;
    if let Some(err) = response.error {
        return Err(AppError::Connection(format!("{method}: rpc error {} {}", err.code, err.message)));
    }
    response
        .result
        .ok_or_else(|| AppError::Connection(format!("{method}: response without result")))
}

/// Only confirmed or finalized statuses count; `processed` may still roll back.
fn status_from_raw(raw: Option<RawStatus>) -> SignatureStatus {
    match raw {
        Some(RawStatus {
            err,
            confirmation_status: Some(level),
        }) if level == "confirmed" || level == "finalized" => SignatureStatus::Confirmed {
            error: err.map(|e| e.to_string()),
        },
        _ => SignatureStatus::Pending,
    }
}

/// JSON-RPC client for the submission side of a Solana-style node.
pub struct RpcSubmitter {
    url: Url,
    client: Client,
    next_id: AtomicU64,
}

impl RpcSubmitter {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Connection(format!("HTTP client: {e}")))?;
        Ok(Self {
            url,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let resp = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("{method}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Connection(format!("{method}: http {status}")));
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Connection(format!("{method}: {e}")))?;
        decode_response(method, value)
    }

    async fn read<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, AppError> {
        retry_async(
            |_| self.call(method, params.clone()),
            READ_ATTEMPTS,
            READ_RETRY_DELAY,
        )
        .await
    }
}

#[async_trait]
impl NetworkSubmitter for RpcSubmitter {
    async fn submit_raw(&self, bytes: &[u8]) -> Result<(), AppError> {
        let encoded = BASE64.encode(bytes);
        let params = json!([
            encoded,
            { "encoding": "base64", "skipPreflight": true, "maxRetries": 0 }
        ]);
        let signature: String = self.call("sendTransaction", params).await?;
        tracing::trace!(target: "rpc", %signature, "Transaction sent");
        Ok(())
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, AppError> {
        let params = json!([[signature.to_string()], { "searchTransactionHistory": false }]);
        let statuses: WithContext<Vec<Option<RawStatus>>> = self.read("getSignatureStatuses", params).await?;
        Ok(status_from_raw(statuses.value.into_iter().next().flatten()))
    }

    async fn block_height(&self) -> Result<u64, AppError> {
        self.read("getBlockHeight", json!([{ "commitment": "confirmed" }]))
            .await
    }

    async fn latest_blockhash(&self) -> Result<Hash, AppError> {
        let latest: WithContext<RawBlockhash> = self
            .read("getLatestBlockhash", json!([{ "commitment": "confirmed" }]))
            .await?;
        Hash::from_str(&latest.value.blockhash)
            .map_err(|e| AppError::Connection(format!("getLatestBlockhash: bad hash ({e})")))
    }

    async fn simulate(&self, bytes: &[u8]) -> Result<Simulation, AppError> {
        let params = json!([
            BASE64.encode(bytes),
            {
                "encoding": "base64",
                "sigVerify": false,
                "replaceRecentBlockhash": true,
                "commitment": "confirmed"
            }
        ]);
        let sim: WithContext<RawSimulation> = self.read("simulateTransaction", params).await?;
        Ok(Simulation {
            units_consumed: sim.value.units_consumed,
            error: sim.value.err.map(|e| e.to_string()),
            logs: sim.value.logs.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_become_connection_errors() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32005, "message": "Node is behind" }
        });
        let err = decode_response::<u64>("getBlockHeight", body).unwrap_err();
        assert!(matches!(err, AppError::Connection(msg) if msg.contains("-32005")));
    }

    #[test]
    fn block_height_result_decodes() {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "result": 123_456u64 });
        assert_eq!(decode_response::<u64>("getBlockHeight", body).unwrap(), 123_456);
    }

    #[test]
    fn statuses_map_commitment_levels() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "context": { "slot": 1 },
                "value": [
                    { "slot": 1, "confirmations": 0, "err": null, "confirmationStatus": "processed" },
                    { "slot": 1, "confirmations": null, "err": null, "confirmationStatus": "finalized" },
                    { "slot": 1, "confirmations": 1, "err": { "InstructionError": [2, "Custom"] }, "confirmationStatus": "confirmed" },
                    null
                ]
            }
        });
        let decoded: WithContext<Vec<Option<RawStatus>>> =
            decode_response("getSignatureStatuses", body).unwrap();
        let statuses: Vec<SignatureStatus> = decoded.value.into_iter().map(status_from_raw).collect();
        assert_eq!(statuses[0], SignatureStatus::Pending);
        assert_eq!(statuses[1], SignatureStatus::Confirmed { error: None });
        assert!(matches!(&statuses[2], SignatureStatus::Confirmed { error: Some(e) } if e.contains("InstructionError")));
        assert_eq!(statuses[3], SignatureStatus::Pending);
    }

    #[test]
    fn simulation_fields_decode() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": {
                "context": { "slot": 9 },
                "value": { "err": null, "logs": ["Program log: ok"], "unitsConsumed": 48_210u64 }
            }
        });
        let sim: WithContext<RawSimulation> = decode_response("simulateTransaction", body).unwrap();
        assert_eq!(sim.value.units_consumed, Some(48_210));
        assert!(sim.value.err.is_none());
        assert_eq!(sim.value.logs.unwrap_or_default().len(), 1);
    }
}
