//! HTTP/JSON client for the in-game bridge mod
//!
//! Endpoints: `GET health`, `GET state`, `GET legal`, `POST action`,
//! `POST reset`, `POST config`. Connection failures and timeouts are retried
//! with a fixed delay; HTTP error statuses are returned immediately.

use std::time::Duration;

use async_trait::async_trait;
use balatro_core::schema::{ActionResult, GameState, Health, LegalActionSet};
use balatro_core::StructuredAction;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::bridge::{Bridge, BridgeError, ResetOutcome};

/// Connection parameters for [`HttpBridge`]
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts for a request that fails to connect
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            timeout: Duration::from_secs(5),
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl BridgeConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Reset reply; only the presence of `error` matters
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResetReply {
    error: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpBridge {
    client: Client,
    base_url: String,
    retry_count: u32,
    retry_delay: Duration,
}

impl HttpBridge {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let base_url = config.base_url();
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BridgeError::Transport {
                url: base_url.clone(),
                attempts: 0,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            retry_count: config.retry_count.max(1),
            retry_delay: config.retry_delay,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Update bridge-side options; returns the bridge's current configuration
    pub async fn configure(&self, options: Map<String, Value>) -> Result<Value, BridgeError> {
        self.request(Method::POST, "config", Some(&Value::Object(options)))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, BridgeError> {
        self.request(Method::GET, endpoint, None).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, BridgeError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut last_error = String::new();

        for attempt in 1..=self.retry_count {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.retry_count {
                        warn!(
                            "Request {} {} failed (attempt {}/{}): {}",
                            method, url, attempt, self.retry_count, e
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                return Err(BridgeError::Status {
                    url,
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(|e| BridgeError::Transport {
                url: url.clone(),
                attempts: attempt,
                message: format!("failed to read body: {}", e),
            })?;
            debug!("{} {} -> {} ({} bytes)", method, url, status, bytes.len());

            return serde_json::from_slice(&bytes).map_err(|e| BridgeError::Decode {
                url,
                message: e.to_string(),
            });
        }

        Err(BridgeError::Transport {
            url,
            attempts: self.retry_count,
            message: last_error,
        })
    }
}

#[async_trait]
impl Bridge for HttpBridge {
    async fn health(&self) -> Result<Health, BridgeError> {
        self.get("health").await
    }

    async fn state(&self) -> Result<GameState, BridgeError> {
        self.get("state").await
    }

    async fn legal_actions(&self) -> Result<LegalActionSet, BridgeError> {
        self.get("legal").await
    }

    async fn execute(&self, action: &StructuredAction) -> Result<ActionResult, BridgeError> {
        let body = serde_json::to_value(action.to_request()).map_err(|e| BridgeError::Decode {
            url: format!("{}/action", self.base_url),
            message: format!("failed to encode action: {}", e),
        })?;
        debug!("Executing {}", action);
        self.request(Method::POST, "action", Some(&body)).await
    }

    async fn reset(&self, seed: Option<&str>) -> Result<ResetOutcome, BridgeError> {
        let body = match seed {
            Some(seed) => json!({ "seed": seed }),
            None => json!({}),
        };
        let reply: ResetReply = self.request(Method::POST, "reset", Some(&body)).await?;

        if let Some(error) = reply.error.filter(|error| !error.is_null()) {
            let reason = match error {
                Value::String(reason) => reason,
                other => other.to_string(),
            };
            return Ok(ResetOutcome::Unsupported(reason));
        }

        let state = self.state().await?;
        let legal = self.legal_actions().await?;
        Ok(ResetOutcome::Reset { state, legal })
    }
}
